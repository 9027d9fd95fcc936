#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod section;

pub use section::{DEFAULT_SECTION_ID, Section, SectionCatalog};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when a transcript is rendered for people to read.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
        }
    }
}

/// One entry of a section transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub const fn new(role: Role, content: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content,
            timestamp,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Utc::now())
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), Utc::now())
    }
}

/// Section id → ordered messages. Ordered keys keep the persisted form stable.
pub type TranscriptMap = BTreeMap<String, Vec<Message>>;

/// Body of a query sent to the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskRequest {
    pub prompt: String,
    pub current_section: String,
}

/// Successful reply from the remote service.
///
/// The service only emits `redirect` and `section` when it decides the query
/// belongs elsewhere, so both default when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskReply {
    pub response: String,
    #[serde(default)]
    pub redirect: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl AskReply {
    #[must_use]
    pub fn answer(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            redirect: false,
            section: None,
        }
    }

    #[must_use]
    pub fn redirect(section: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            redirect: true,
            section: Some(section.into()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AskError {
    #[error("failed to reach the service: {0}")]
    Transport(String),

    #[error("service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed service response: {0}")]
    Malformed(String),
}

impl AskError {
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// The remote classification/response service.
#[async_trait]
pub trait AskService: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, AskError>;
}

#[async_trait]
impl<T: AskService + ?Sized> AskService for Arc<T> {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, AskError> {
        (**self).ask(request).await
    }
}

/// Durable local state: the active section id and the transcript mapping,
/// kept as two independent records.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read_active_section(&self) -> anyhow::Result<Option<String>>;
    async fn write_active_section(&self, section_id: &str) -> anyhow::Result<()>;
    async fn read_transcripts(&self) -> anyhow::Result<Option<TranscriptMap>>;
    async fn write_transcripts(&self, transcripts: &TranscriptMap) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn read_active_section(&self) -> anyhow::Result<Option<String>> {
        (**self).read_active_section().await
    }

    async fn write_active_section(&self, section_id: &str) -> anyhow::Result<()> {
        (**self).write_active_section(section_id).await
    }

    async fn read_transcripts(&self) -> anyhow::Result<Option<TranscriptMap>> {
        (**self).read_transcripts().await
    }

    async fn write_transcripts(&self, transcripts: &TranscriptMap) -> anyhow::Result<()> {
        (**self).write_transcripts(transcripts).await
    }
}
