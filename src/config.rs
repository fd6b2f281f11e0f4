//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
/// Default file backend table.
pub const DEFAULT_QUEUE_PATH: &str = "data/chat_queue.jsonl";
/// Default database backend file.
pub const DEFAULT_QUEUE_DB_PATH: &str = "data/chat_queue.db";

/// Which queue backend the process routes chat messages to.
///
/// Fixed once at startup; never re-evaluated per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackendKind {
    File,
    Database,
}

impl QueueBackendKind {
    /// Truthy flag value selects the database backend, anything else the file backend.
    pub fn from_flag(value: Option<&str>) -> Self {
        if value.is_some_and(is_truthy) {
            Self::Database
        } else {
            Self::File
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Database => "database",
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Connection settings for the reply-generation collaborator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub url: String,
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

/// Gateway configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    pub bind: SocketAddr,
    /// Queue backend selected for the lifetime of the process.
    pub queue_backend: QueueBackendKind,
    /// Append-only table used by the file backend.
    pub queue_path: PathBuf,
    /// libSQL database used by the database backend.
    pub queue_db_path: PathBuf,
    /// Reply pipeline endpoint; `None` leaves `/reply` unavailable.
    pub pipeline: Option<PipelineConfig>,
    /// Optional directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            queue_backend: QueueBackendKind::File,
            queue_path: PathBuf::from(DEFAULT_QUEUE_PATH),
            queue_db_path: PathBuf::from(DEFAULT_QUEUE_DB_PATH),
            pipeline: None,
            log_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("GATEWAY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: "GATEWAY_BIND".to_string(),
            message: format!("{bind_raw:?}: {e}"),
        })?;

        let queue_backend = QueueBackendKind::from_flag(lookup("USE_DB_QUEUE").as_deref());

        let queue_path = lookup("CHAT_QUEUE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUEUE_PATH));
        let queue_db_path = lookup("CHAT_QUEUE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUEUE_DB_PATH));

        let pipeline = match lookup("REPLY_PIPELINE_URL").filter(|s| !s.trim().is_empty()) {
            Some(url) => {
                let timeout_secs: u64 = match lookup("REPLY_PIPELINE_TIMEOUT_SECS") {
                    Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                        key: "REPLY_PIPELINE_TIMEOUT_SECS".to_string(),
                        message: format!("{raw:?}: {e}"),
                    })?,
                    None => 60,
                };
                Some(PipelineConfig {
                    url,
                    token: lookup("REPLY_PIPELINE_TOKEN")
                        .filter(|s| !s.is_empty())
                        .map(SecretString::from),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            None => None,
        };

        let log_dir = lookup("GATEWAY_LOG_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind,
            queue_backend,
            queue_path,
            queue_db_path,
            pipeline,
            log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_select_file_backend() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.queue_backend, QueueBackendKind::File);
        assert_eq!(config.queue_path, PathBuf::from(DEFAULT_QUEUE_PATH));
        assert_eq!(config.bind.port(), 8000);
        assert!(config.pipeline.is_none());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn truthy_flag_values_select_database() {
        for value in ["1", "true", "TRUE", " yes ", "On"] {
            assert_eq!(
                QueueBackendKind::from_flag(Some(value)),
                QueueBackendKind::Database,
                "{value:?} should be truthy"
            );
        }
    }

    #[test]
    fn other_flag_values_select_file() {
        for value in ["", "0", "false", "no", "off", "database", "2"] {
            assert_eq!(
                QueueBackendKind::from_flag(Some(value)),
                QueueBackendKind::File,
                "{value:?} should not be truthy"
            );
        }
        assert_eq!(QueueBackendKind::from_flag(None), QueueBackendKind::File);
    }

    #[test]
    fn pipeline_settings_are_read() {
        let config = config_from(&[
            ("REPLY_PIPELINE_URL", "http://localhost:9000/generate"),
            ("REPLY_PIPELINE_TOKEN", "secret"),
            ("REPLY_PIPELINE_TIMEOUT_SECS", "15"),
            ("USE_DB_QUEUE", "true"),
        ])
        .unwrap();
        let pipeline = config.pipeline.unwrap();
        assert_eq!(pipeline.url, "http://localhost:9000/generate");
        assert!(pipeline.token.is_some());
        assert_eq!(pipeline.timeout, Duration::from_secs(15));
        assert_eq!(config.queue_backend, QueueBackendKind::Database);
    }

    #[test]
    fn invalid_bind_address_is_rejected() {
        let err = config_from(&[("GATEWAY_BIND", "not-an-address")]).unwrap_err();
        assert!(err.to_string().contains("GATEWAY_BIND"));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let err = config_from(&[
            ("REPLY_PIPELINE_URL", "http://localhost:9000"),
            ("REPLY_PIPELINE_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("REPLY_PIPELINE_TIMEOUT_SECS"));
    }
}
