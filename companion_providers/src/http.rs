use std::time::Duration;

use async_trait::async_trait;
use companion_core::{AskError, AskReply, AskRequest, AskService};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Error body the service sends with non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// `AskService` speaking JSON over HTTP to `{base_url}/api/ask`.
pub struct HttpAskService {
    client: Client,
    base_url: String,
}

impl HttpAskService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Creating HttpAskService for {base_url}");
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/api/ask", self.base_url)
    }
}

/// Turn a raw status/body pair into the service outcome.
fn parse_reply(status: u16, body: &str) -> Result<AskReply, AskError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map_or_else(|_| body.trim().to_string(), |b| b.error);
        return Err(AskError::Status { status, message });
    }

    serde_json::from_str::<AskReply>(body).map_err(|e| AskError::Malformed(e.to_string()))
}

#[async_trait]
impl AskService for HttpAskService {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, AskError> {
        debug!(
            "Sending query to {} (current_section={})",
            self.endpoint(),
            request.current_section
        );

        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|e| AskError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::Transport(e.to_string()))?;

        let reply = parse_reply(status, &body);
        match &reply {
            Ok(r) if r.redirect => info!("Service redirected query to {:?}", r.section),
            Ok(_) => debug!("Received answer ({} chars)", body.len()),
            Err(e) => warn!("Service call failed: {e}"),
        }
        reply
    }
}
