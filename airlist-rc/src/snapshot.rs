//! Engine state snapshot persistence
//!
//! The engine survives restarts through a small snapshot saved at the
//! end of every tick: enough to avoid re-adding the currently playing
//! track, re-running an imminent sweep, or losing queued retries. The
//! store trait hides the medium; the default implementation writes JSON
//! through a temp file and rename so a crash mid-write never corrupts
//! the previous snapshot.

use crate::error::{Error, Result};
use crate::retry_queue::RetryItem;
use airlist_common::events::ServiceState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted engine state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Source id of the last broadcast occurrence processed
    pub last_inserted_source_id: Option<String>,
    /// Unix seconds of the last completed duplicate sweep
    pub last_sweep_unix: Option<i64>,
    /// Scheduler state at save time (only a manual pause is restored)
    #[serde(default)]
    pub service_state: ServiceState,
    /// Retry queue contents, head first
    #[serde(default)]
    pub retry_queue: Vec<RetryItem>,
    /// Recently inserted catalog ids, oldest first
    #[serde(default)]
    pub recently_inserted: Vec<String>,
}

/// Snapshot persistence primitives
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load the saved snapshot; `None` on first run
    async fn load(&self) -> Result<Option<Snapshot>>;
}

/// JSON file snapshot store
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let contents = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| Error::Snapshot(format!("serialize: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &contents)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&contents)
            .map_err(|e| Error::Snapshot(format!("{}: {}", self.path.display(), e)))?;
        Ok(Some(snapshot))
    }
}
