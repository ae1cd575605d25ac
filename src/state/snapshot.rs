//! C6 — Snapshot Persistence.
//!
//! Serializes the event log, wallet sessions, and the task-creation counter
//! to a single JSON file so a restart does not forget who already paid, per
//! `spec.md` §4.6. Writes are atomic (write to a temp file, then rename) so
//! a crash mid-write never leaves a corrupt snapshot on disk; loads are
//! tolerant of a missing, empty, or corrupt file — in every one of those
//! cases the gateway just starts from empty state rather than refusing to
//! boot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{event::Event, session::Session};

/// Wire shape matches `spec.md` §6.4 exactly: `paymentLog`, `siwxSessions`,
/// `totalTasks`, `startedAt`, `savedAt`. `started_at` is the process epoch —
/// the first moment this gateway ever ran, not the moment of the current
/// restart — so it is carried forward unchanged on every reload; `saved_at`
/// is stamped fresh on every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "paymentLog")]
    pub events: Vec<Event>,
    #[serde(rename = "siwxSessions")]
    pub sessions: HashMap<String, Session>,
    #[serde(rename = "totalTasks")]
    pub total_tasks_created: u64,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl Default for Snapshot {
    fn default() -> Self {
        let now = Utc::now();
        Snapshot {
            events: Vec::new(),
            sessions: HashMap::new(),
            total_tasks_created: 0,
            started_at: now,
            saved_at: now,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to write snapshot to {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("failed to rename snapshot into place at {0}: {1}")]
    Rename(PathBuf, std::io::Error),
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Loads a snapshot from `path`, defaulting to an empty snapshot if the file
/// is absent, empty, or fails to parse. A corrupt snapshot is logged and
/// discarded rather than treated as a fatal startup error.
pub async fn load(path: &Path) -> Snapshot {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(_) => {
            info!(path = %path.display(), "no snapshot found, starting from empty state");
            return Snapshot::default();
        }
    };
    if content.trim().is_empty() {
        info!(path = %path.display(), "snapshot file is empty, starting from empty state");
        return Snapshot::default();
    }
    match serde_json::from_str(&content) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warn!(path = %path.display(), %error, "snapshot file is corrupt, discarding it");
            Snapshot::default()
        }
    }
}

/// Writes `snapshot` to `path` atomically: serialize to `path.tmp`, then
/// rename over `path`.
pub async fn save(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let body = serde_json::to_vec_pretty(snapshot)?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &body)
        .await
        .map_err(|e| SnapshotError::Write(tmp_path.clone(), e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SnapshotError::Rename(path.to_path_buf(), e))?;
    Ok(())
}
