use companion_core::AskError;
use thiserror::Error;

/// A submission or command refused before it changed anything.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("a request is already in progress")]
    RequestPending,

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("submission is no longer pending")]
    StaleHandle,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Transport(AskError),

    #[error("malformed service response: {0}")]
    MalformedResponse(String),

    #[error("state store unavailable, changes are kept in memory only: {0}")]
    Persistence(String),
}

impl From<AskError> for SessionError {
    fn from(error: AskError) -> Self {
        match error {
            AskError::Malformed(reason) => Self::MalformedResponse(reason),
            other => Self::Transport(other),
        }
    }
}

impl SessionError {
    /// Whether resubmitting the same query may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedResponse(_))
    }

    /// Short message suitable for showing to the user.
    #[must_use]
    pub fn user_notice(&self) -> String {
        match self {
            Self::Validation(e) => format!("Cannot send: {e}."),
            Self::Transport(_) | Self::MalformedResponse(_) => {
                "Failed to reach the service. Please try again.".to_string()
            }
            Self::Persistence(_) => {
                "Your history could not be saved; it will be lost when you quit.".to_string()
            }
        }
    }
}
