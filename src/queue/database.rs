//! libSQL-backed chat queue.
//!
//! Each enqueue call runs in its own transaction: either every record in
//! the batch is inserted or none are.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::migrations;
use super::{EnqueueResult, QueueSink};
use crate::chat::CanonicalMessage;
use crate::error::{DatabaseError, QueueError};

/// A row read back from the `chat_queue` table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub id: i64,
    pub message: CanonicalMessage,
    pub enqueued_at: DateTime<Utc>,
}

/// Transactional database sink.
///
/// Holds a single connection behind an async mutex so that each call owns
/// the connection for the whole of its transaction.
pub struct LibSqlQueueSink {
    #[allow(dead_code)]
    db: LibSqlDatabase,
    conn: Mutex<Connection>,
}

impl LibSqlQueueSink {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let sink = Self::from_database(db).await?;
        info!(path = %path.display(), "Chat queue database opened");
        Ok(sink)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db,
            conn: Mutex::new(conn),
        })
    }

    /// Number of rows in the queue.
    pub async fn queued_count(&self) -> Result<u64, DatabaseError> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM chat_queue", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("queued_count: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("queued_count: {e}")))?;
        match row {
            Some(row) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("queued_count: {e}")))?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }

    /// Look up a queued row by its identifier.
    pub async fn get(&self, id: i64) -> Result<Option<QueuedMessage>, DatabaseError> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT id, conversation_id, text, end_user_handle, channel, enqueued_at
                 FROM chat_queue WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get: {e}")))?
        else {
            return Ok(None);
        };

        let read = |e: libsql::Error| DatabaseError::Query(format!("get: {e}"));
        let enqueued_at: String = row.get(5).map_err(read)?;
        Ok(Some(QueuedMessage {
            id: row.get(0).map_err(read)?,
            message: CanonicalMessage {
                conversation_id: row.get(1).map_err(read)?,
                text: row.get(2).map_err(read)?,
                end_user_handle: row.get(3).map_err(read)?,
                channel: row.get(4).map_err(read)?,
            },
            enqueued_at: parse_datetime(&enqueued_at),
        }))
    }
}

/// Parse an RFC 3339 timestamp as written by this module.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Insert every message inside `conn`'s open transaction, returning the
/// last assigned row id.
async fn insert_all(conn: &Connection, batch: &[CanonicalMessage]) -> Result<i64, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    let mut last_id = 0;
    for message in batch {
        conn.execute(
            "INSERT INTO chat_queue (conversation_id, text, end_user_handle, channel, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.conversation_id.as_str(),
                message.text.as_str(),
                message.end_user_handle.as_str(),
                message.channel.as_str(),
                now.as_str(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert chat_queue: {e}")))?;
        last_id = conn.last_insert_rowid();
    }
    Ok(last_id)
}

#[async_trait]
impl QueueSink for LibSqlQueueSink {
    fn name(&self) -> &'static str {
        "libsql"
    }

    async fn enqueue(&self, batch: &[CanonicalMessage]) -> Result<EnqueueResult, QueueError> {
        if batch.is_empty() {
            return Ok(EnqueueResult::count(0));
        }

        let conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("begin: {e}")))?;

        let last_id = match insert_all(&tx, batch).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, rows = batch.len(), "Insert failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                return Err(e.into());
            }
        };

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("commit: {e}")))?;

        debug!(rows = batch.len(), last_id, "Committed chat queue rows");
        if batch.len() == 1 {
            Ok(EnqueueResult::with_reference(1, last_id))
        } else {
            Ok(EnqueueResult::count(batch.len()))
        }
    }
}
