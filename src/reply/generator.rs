//! Reply-generation collaborator contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::types::ReplyMetadata;
use crate::error::PipelineError;

/// Raw output of the reply-generation collaborator.
///
/// Any score it reports is ignored; the gateway recomputes the evaluation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedReply {
    pub reply: String,
    /// Key set the collaborator used (its defaults when the caller gave none).
    #[serde(default)]
    pub expected_keys: Vec<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

/// Opaque function from email text plus metadata to an answer set.
///
/// Implementations are treated as blocking, expensive and non-idempotent:
/// callers never retry a failed generation.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Whether the generator is ready to serve requests.
    fn is_ready(&self) -> bool {
        true
    }

    /// Generate a reply. `metadata` is `None` when the caller supplied nothing.
    async fn generate(
        &self,
        email: &str,
        metadata: Option<&ReplyMetadata>,
    ) -> Result<GeneratedReply, PipelineError>;
}

/// Stand-in used when no reply pipeline is configured.
pub struct UnavailableGenerator;

#[async_trait]
impl ReplyGenerator for UnavailableGenerator {
    fn is_ready(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _email: &str,
        _metadata: Option<&ReplyMetadata>,
    ) -> Result<GeneratedReply, PipelineError> {
        Err(PipelineError::Unavailable(
            "no reply pipeline configured (set REPLY_PIPELINE_URL)".to_string(),
        ))
    }
}
