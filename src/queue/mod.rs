//! Chat queue routing.
//!
//! A [`QueueRouter`] owns exactly one [`QueueSink`], chosen at startup from
//! the backend flag. There is no per-request backend switching, no dual
//! write and no failover: a sink failure is reported to the caller.

pub mod database;
pub mod file;
mod migrations;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

pub use database::LibSqlQueueSink;
pub use file::FileQueueSink;

use crate::chat::CanonicalMessage;
use crate::config::QueueBackendKind;
use crate::error::QueueError;

/// Acknowledgment of a committed enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueResult {
    /// Records fully committed by the sink.
    pub enqueued_count: usize,
    /// Storage-assigned identifier, only from sinks that issue one.
    pub backend_reference: Option<i64>,
}

impl EnqueueResult {
    pub fn count(enqueued_count: usize) -> Self {
        Self {
            enqueued_count,
            backend_reference: None,
        }
    }

    pub fn with_reference(enqueued_count: usize, reference: i64) -> Self {
        Self {
            enqueued_count,
            backend_reference: Some(reference),
        }
    }
}

/// A storage target for canonical chat messages.
#[async_trait]
pub trait QueueSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Persist `batch` in order. Either every record is committed or the
    /// call fails and none are.
    async fn enqueue(&self, batch: &[CanonicalMessage]) -> Result<EnqueueResult, QueueError>;
}

/// Routes every enqueue to the single backend selected at startup.
#[derive(Clone)]
pub struct QueueRouter {
    kind: QueueBackendKind,
    sink: Arc<dyn QueueSink>,
}

impl QueueRouter {
    /// Wrap an already constructed sink.
    pub fn new(kind: QueueBackendKind, sink: Arc<dyn QueueSink>) -> Self {
        Self { kind, sink }
    }

    /// Pick the sink matching `kind`. The other sink is dropped and can
    /// never receive a record through this router.
    pub fn select(
        kind: QueueBackendKind,
        file_sink: Arc<dyn QueueSink>,
        database_sink: Arc<dyn QueueSink>,
    ) -> Self {
        let sink = match kind {
            QueueBackendKind::File => file_sink,
            QueueBackendKind::Database => database_sink,
        };
        Self::new(kind, sink)
    }

    /// Construct only the selected backend from its configured location.
    pub async fn open(
        kind: QueueBackendKind,
        queue_path: &Path,
        queue_db_path: &Path,
    ) -> Result<Self, QueueError> {
        let sink: Arc<dyn QueueSink> = match kind {
            QueueBackendKind::File => Arc::new(FileQueueSink::new(queue_path)),
            QueueBackendKind::Database => Arc::new(LibSqlQueueSink::new_local(queue_db_path).await?),
        };
        info!(backend = kind.label(), sink = sink.name(), "Chat queue backend selected");
        Ok(Self::new(kind, sink))
    }

    pub fn backend(&self) -> QueueBackendKind {
        self.kind
    }

    /// Enqueue a single message.
    pub async fn enqueue_one(&self, message: CanonicalMessage) -> Result<EnqueueResult, QueueError> {
        self.enqueue(std::slice::from_ref(&message)).await
    }

    /// Enqueue an ordered batch on the selected backend.
    pub async fn enqueue(&self, batch: &[CanonicalMessage]) -> Result<EnqueueResult, QueueError> {
        match self.sink.enqueue(batch).await {
            Ok(result) => {
                info!(
                    backend = self.kind.label(),
                    count = result.enqueued_count,
                    reference = ?result.backend_reference,
                    "Chat messages enqueued"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(backend = self.kind.label(), error = %e, "Chat enqueue failed");
                Err(e)
            }
        }
    }
}
