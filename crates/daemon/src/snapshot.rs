//! Warm-start snapshot of raw documents and tags
//!
//! The snapshot holds API payloads, never the index itself; loading one
//! replays it through the same sync events a live refresh would emit.

use std::path::Path;

use serde::{Deserialize, Serialize};

use common::document::Document;
use common::events::{DispatchError, EventDispatcher, SyncEvent};
use common::index::Tag;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event queue closed: {0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Snapshot {
    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Self = serde_json::from_slice(&bytes)?;
        tracing::info!(
            path = %path.display(),
            documents = snapshot.documents.len(),
            tags = snapshot.tags.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    pub async fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, bytes).await?;
        tracing::info!(path = %path.display(), "saved snapshot");
        Ok(())
    }

    /// Emit the events that rebuild the snapshot's state in an empty index
    ///
    /// Tags go first so no document references an unknown tag.
    pub fn replay(self, events: &EventDispatcher) -> Result<(), SnapshotError> {
        events.dispatch(SyncEvent::TagsAdded(self.tags))?;
        events.dispatch(SyncEvent::DocumentsAdded(self.documents))?;
        Ok(())
    }
}
