use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::models::audit::AuditEntry;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to encode audit entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write audit entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit sink rejected entry: {0}")]
    Rejected(String),
}

/// One-way sink for committed mutations.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Writes entries to the `audit` tracing target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let snapshot = serde_json::to_string(&entry.snapshot)?;
        info!(
            target: "audit",
            audit_id = %entry.id,
            actor_id = %entry.actor_id,
            action = ?entry.action,
            order_id = %entry.snapshot.id,
            snapshot = %snapshot,
            "mutation committed"
        );
        Ok(())
    }
}

/// Appends one JSON document per line.
pub struct FileAuditSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps entries in memory; used by tests and local runs.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .map_err(|err| AuditError::Rejected(err.to_string()))?
            .push(entry);
        Ok(())
    }
}
