//! HTTP client for a remote reply-generation service.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, warn};

use super::generator::{GeneratedReply, ReplyGenerator};
use super::types::ReplyMetadata;
use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Maximum number of response-body bytes echoed into an error message.
const ERROR_BODY_PREVIEW: usize = 512;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a ReplyMetadata>,
}

/// Reply generator that POSTs `{email, metadata}` to a configured endpoint
/// and expects `{reply, expected_keys, answers}` back.
pub struct HttpReplyGenerator {
    client: reqwest::Client,
    config: PipelineConfig,
}

impl HttpReplyGenerator {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ReplyGenerator for HttpReplyGenerator {
    async fn generate(
        &self,
        email: &str,
        metadata: Option<&ReplyMetadata>,
    ) -> Result<GeneratedReply, PipelineError> {
        let body = GenerateRequest { email, metadata };

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token.expose_secret());
        }

        debug!(url = %self.config.url, "Calling reply pipeline");
        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
            warn!(status = status.as_u16(), "Reply pipeline returned error status");
            return Err(PipelineError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }

        response
            .json::<GeneratedReply>()
            .await
            .map_err(|e| PipelineError::InvalidResponse(e.to_string()))
    }
}
