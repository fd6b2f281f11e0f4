//! Chat message normalization.
//!
//! Inbound chat payloads arrive from several callers with loosely agreed
//! field names. They are first read into [`InboundChatPayload`], where every
//! field is either a non-empty string or absent, and then resolved into a
//! fully populated [`CanonicalMessage`].

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_CONVERSATION_ID: &str = "api-web";
pub const DEFAULT_END_USER_HANDLE: &str = "api-user";
pub const DEFAULT_CHANNEL: &str = "web_chat";

/// Normalized inbound chat record. All fields are always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub conversation_id: String,
    pub text: String,
    pub end_user_handle: String,
    pub channel: String,
}

/// Recognized fields of an inbound chat payload.
///
/// Non-string and empty-string values are read as absent, so deserializing
/// a JSON object into this type cannot fail on field contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundChatPayload {
    #[serde(default, deserialize_with = "non_empty_text")]
    pub conversation_id: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub end_user_handle: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "non_empty_text")]
    pub channel: Option<String>,
}

fn non_empty_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

impl InboundChatPayload {
    /// Read recognized fields out of an arbitrary JSON value.
    ///
    /// Anything that is not an object yields an empty payload.
    pub fn from_value(value: &serde_json::Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        Self::deserialize(value).unwrap_or_default()
    }

    /// Resolve fields in precedence order, substituting defaults.
    pub fn into_canonical(self) -> CanonicalMessage {
        CanonicalMessage {
            conversation_id: self
                .conversation_id
                .unwrap_or_else(|| DEFAULT_CONVERSATION_ID.to_string()),
            text: self.text.or(self.message).unwrap_or_default(),
            end_user_handle: self
                .end_user_handle
                .or(self.user)
                .unwrap_or_else(|| DEFAULT_END_USER_HANDLE.to_string()),
            channel: self.channel.unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
        }
    }
}

/// Normalize any inbound payload into a canonical message. Never fails.
pub fn normalize(payload: &serde_json::Value) -> CanonicalMessage {
    InboundChatPayload::from_value(payload).into_canonical()
}
