//! File-backed chat queue.
//!
//! The queue is an append-only JSON Lines table: one object per line with
//! the columns `conversation_id`, `text`, `end_user_handle`, `channel`.
//! Existing rows are never rewritten.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::{EnqueueResult, QueueSink};
use crate::chat::CanonicalMessage;
use crate::error::QueueError;

/// Append-only file sink shared by all requests.
///
/// Appends are serialized by a single writer lock. The lock guard moves into
/// the blocking task that performs open, write, flush, sync and any
/// rollback, so the sequence always runs to completion and releases the
/// lock only afterwards, even if the calling future is dropped.
pub struct FileQueueSink {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileQueueSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row currently in the table. A missing file has no rows.
    pub async fn read_rows(&self) -> Result<Vec<CanonicalMessage>, QueueError> {
        let _guard = self.write_lock.lock().await;
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(QueueError::from))
            .collect()
    }

    fn encode(batch: &[CanonicalMessage]) -> Result<Vec<u8>, QueueError> {
        let mut buf = Vec::new();
        for message in batch {
            serde_json::to_writer(&mut buf, message)?;
            buf.push(b'\n');
        }
        Ok(buf)
    }
}

#[async_trait]
impl QueueSink for FileQueueSink {
    fn name(&self) -> &'static str {
        "jsonl-file"
    }

    async fn enqueue(&self, batch: &[CanonicalMessage]) -> Result<EnqueueResult, QueueError> {
        if batch.is_empty() {
            return Ok(EnqueueResult::count(0));
        }
        let rows = Self::encode(batch)?;
        let row_count = batch.len();

        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let path = self.path.clone();

        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            append_locked(&path, &rows)?;
            debug!(
                path = %path.display(),
                rows = row_count,
                bytes = rows.len(),
                "Appended rows to queue file"
            );
            Ok::<_, std::io::Error>(())
        });

        task.await
            .map_err(|e| QueueError::Io(std::io::Error::other(format!("append task failed: {e}"))))??;
        Ok(EnqueueResult::count(row_count))
    }
}

/// Open the table and append `rows`, truncating back to the original length
/// if any step fails. Caller must hold the writer lock.
fn append_locked(path: &Path, rows: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;
    let start_len = file.metadata()?.len();

    if let Err(e) = append_rows(&mut file, start_len, rows) {
        warn!(path = %path.display(), error = %e, "Append failed, rolling back");
        if let Err(rollback) = file.set_len(start_len) {
            error!(
                path = %path.display(),
                error = %rollback,
                "Failed to truncate queue file after failed append"
            );
        }
        return Err(e);
    }
    Ok(())
}

/// Write `rows` at the end of `file` and sync them to disk.
///
/// If the last existing row lacks its newline, one is written first so the
/// new rows start on a fresh line.
fn append_rows(file: &mut File, start_len: u64, rows: &[u8]) -> std::io::Result<()> {
    if start_len > 0 {
        file.seek(SeekFrom::Start(start_len - 1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }
    file.write_all(rows)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}
