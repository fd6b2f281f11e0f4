//! Request and response shapes for the `/reply` endpoint.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::evaluation::EvaluationResult;

/// Inbound customer email as posted by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailRequest {
    /// Raw message body.
    pub email: String,
    #[serde(default)]
    pub expected_keys: Option<Vec<String>>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Metadata handed to the reply-generation collaborator.
///
/// Only fields the caller actually supplied are present; absent fields are
/// omitted when serialized so the collaborator applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplyMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
}

impl ReplyMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected_keys(mut self, keys: Vec<String>) -> Self {
        self.expected_keys = Some(keys);
        self
    }

    pub fn with_customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn expected_keys(&self) -> Option<&[String]> {
        self.expected_keys.as_deref()
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer_email.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// True when the caller supplied none of the optional fields.
    pub fn is_empty(&self) -> bool {
        self.expected_keys.is_none() && self.customer_email.is_none() && self.subject.is_none()
    }
}

/// A validated email request: non-blank body plus the supplied metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEmail {
    pub email: String,
    pub metadata: ReplyMetadata,
}

impl EmailRequest {
    /// Validate the request and build the metadata bag.
    ///
    /// Empty optional values are treated as not supplied. Expected keys,
    /// when supplied, must be non-empty and distinct.
    pub fn validate(self) -> Result<ValidatedEmail, GatewayError> {
        if self.email.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "email must not be empty".to_string(),
            ));
        }

        let mut metadata = ReplyMetadata::new();

        if let Some(keys) = self.expected_keys.filter(|k| !k.is_empty()) {
            let mut seen = HashSet::new();
            for key in &keys {
                if key.trim().is_empty() {
                    return Err(GatewayError::InvalidRequest(
                        "expected_keys must not contain empty identifiers".to_string(),
                    ));
                }
                if !seen.insert(key.as_str()) {
                    return Err(GatewayError::InvalidRequest(format!(
                        "expected_keys contains duplicate identifier {key:?}"
                    )));
                }
            }
            metadata = metadata.with_expected_keys(keys);
        }
        if let Some(customer_email) = self.customer_email.filter(|s| !s.is_empty()) {
            metadata = metadata.with_customer_email(customer_email);
        }
        if let Some(subject) = self.subject.filter(|s| !s.is_empty()) {
            metadata = metadata.with_subject(subject);
        }

        Ok(ValidatedEmail {
            email: self.email,
            metadata,
        })
    }
}

/// Reply returned to the caller, with an evaluation derived from `answers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailResponse {
    pub reply: String,
    /// Effective key set used for evaluation.
    pub expected_keys: Vec<String>,
    pub answers: BTreeMap<String, String>,
    pub evaluation: EvaluationResult,
}
