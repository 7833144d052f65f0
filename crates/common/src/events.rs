//! Sync events and the worker that applies them to the index
//!
//! The sync collaborator never touches the index directly. It dispatches
//! [`SyncEvent`]s through an unbounded flume channel; a single worker drains
//! the channel and applies each event in arrival order.

use std::collections::HashSet;

use crate::document::{Document, MediaRoot};
use crate::index::{IndexError, SharedIndex, Tag, TagId};

/// Events emitted by the sync collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Documents were created or updated upstream
    DocumentsAdded(Vec<Document>),

    /// Tags were created or updated upstream
    TagsAdded(Vec<Tag>),

    /// Authoritative list of every document id that currently exists
    CanonicalDocumentIds(Vec<u64>),

    /// Authoritative list of every tag id that currently exists
    CanonicalTagIds(Vec<TagId>),
}

#[derive(Debug, thiserror::Error)]
#[error("event receiver has been dropped")]
pub struct DispatchError;

/// Sending half of the event queue; clone freely
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    tx: flume::Sender<SyncEvent>,
}

impl EventDispatcher {
    /// Create a dispatcher and the receiver the worker should own
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, EventReceiver { rx })
    }

    /// Queue an event; fails only once the receiver is gone
    pub fn dispatch(&self, event: SyncEvent) -> Result<(), DispatchError> {
        self.tx.send(event).map_err(|_| DispatchError)
    }
}

/// Receiving half of the event queue
#[derive(Debug)]
pub struct EventReceiver {
    rx: flume::Receiver<SyncEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocking)
    ///
    /// Returns None once every dispatcher has been dropped.
    pub fn recv(&self) -> Option<SyncEvent> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<SyncEvent> {
        self.rx.try_recv().ok()
    }

    pub async fn recv_async(&self) -> Option<SyncEvent> {
        self.rx.recv_async().await.ok()
    }
}

/// What applying one event did to the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub files_added: usize,
    pub files_removed: usize,
    pub tags_added: usize,
    pub tags_removed: usize,
    /// Malformed documents that were logged and skipped
    pub skipped: usize,
    /// Files the index refused; the rest of their batch still applied
    pub rejected: Vec<IndexError>,
}

/// Applies sync events to a [`SharedIndex`]
#[derive(Debug, Clone)]
pub struct IndexUpdater {
    index: SharedIndex,
    media: MediaRoot,
}

impl IndexUpdater {
    pub fn new(index: SharedIndex, media: MediaRoot) -> Self {
        Self { index, media }
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn apply(&self, event: SyncEvent) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        match event {
            SyncEvent::DocumentsAdded(documents) => {
                for document in &documents {
                    let file = match self.media.to_file(document) {
                        Ok(file) => file,
                        Err(e) => {
                            tracing::warn!(document = document.id, "skipping document: {}", e);
                            outcome.skipped += 1;
                            continue;
                        }
                    };
                    match self.index.add_file(file) {
                        Ok(_) => outcome.files_added += 1,
                        Err(e) => {
                            tracing::error!(document = document.id, "index rejected document: {}", e);
                            outcome.rejected.push(e);
                        }
                    }
                }
            }
            SyncEvent::TagsAdded(tags) => {
                outcome.tags_added = tags.len();
                for tag in tags {
                    self.index.add_tag(tag);
                }
            }
            SyncEvent::CanonicalDocumentIds(ids) => {
                let canonical: HashSet<String> = ids.iter().map(u64::to_string).collect();
                outcome.files_removed = self.index.prune_files(&canonical);
            }
            SyncEvent::CanonicalTagIds(ids) => {
                let canonical: HashSet<TagId> = ids.into_iter().collect();
                outcome.tags_removed = self.index.prune_tags(&canonical);
            }
        }
        outcome
    }
}

/// Drain `events` into the index until every dispatcher is dropped
pub async fn run_worker(updater: IndexUpdater, events: EventReceiver) {
    tracing::info!("index worker started");
    while let Some(event) = events.recv_async().await {
        let outcome = updater.apply(event);
        tracing::debug!(
            files_added = outcome.files_added,
            files_removed = outcome.files_removed,
            tags_added = outcome.tags_added,
            tags_removed = outcome.tags_removed,
            skipped = outcome.skipped,
            rejected = outcome.rejected.len(),
            "applied sync event"
        );
    }
    tracing::info!("index worker stopped: all dispatchers dropped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: u64, name: &str, tags: &[TagId]) -> Document {
        Document {
            id,
            tags: tags.to_vec(),
            archived_file_name: None,
            archive_media_filename: None,
            media_filename: Some(name.to_string()),
            original_filename: None,
            has_archive_version: false,
            created: Some("2024-01-01".to_string()),
            added: Some("2024-01-02".to_string()),
            modified: None,
        }
    }

    fn updater() -> IndexUpdater {
        IndexUpdater::new(SharedIndex::new(), MediaRoot::new("/media"))
    }

    #[test]
    fn test_bad_documents_do_not_abort_batch() {
        let updater = updater();
        updater.apply(SyncEvent::TagsAdded(vec![Tag::new(1, "A")]));

        let mut malformed = document(2, "b.pdf", &[]);
        malformed.media_filename = None;

        let outcome = updater.apply(SyncEvent::DocumentsAdded(vec![
            document(1, "a.pdf", &[1]),
            malformed,
            document(3, "c.pdf", &[99]),
            document(4, "d.pdf", &[]),
        ]));

        assert_eq!(outcome.files_added, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(
            outcome.rejected,
            vec![IndexError::UnknownTagReference {
                file_id: "3".to_string(),
                tag_id: 99,
            }]
        );
        assert_eq!(updater.index().read().file_count(), 2);
    }

    #[test]
    fn test_canonical_ids_prune() {
        let updater = updater();
        updater.apply(SyncEvent::TagsAdded(vec![Tag::new(1, "A"), Tag::new(2, "B")]));
        updater.apply(SyncEvent::DocumentsAdded(vec![
            document(1, "a.pdf", &[1]),
            document(2, "b.pdf", &[2]),
        ]));

        let outcome = updater.apply(SyncEvent::CanonicalDocumentIds(vec![2]));
        assert_eq!(outcome.files_removed, 1);

        let outcome = updater.apply(SyncEvent::CanonicalTagIds(vec![2, 3]));
        assert_eq!(outcome.tags_removed, 1);

        let index = updater.index().read();
        assert!(index.file_by_id("1").is_none());
        assert!(index.tag_by_id(1).is_none());
        assert_eq!(index.tag_names().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_dispatcher_fails_after_receiver_dropped() {
        let (dispatcher, receiver) = EventDispatcher::new();
        dispatcher
            .dispatch(SyncEvent::CanonicalTagIds(vec![]))
            .unwrap();
        assert_eq!(receiver.try_recv(), Some(SyncEvent::CanonicalTagIds(vec![])));

        drop(receiver);
        assert!(dispatcher
            .dispatch(SyncEvent::CanonicalTagIds(vec![]))
            .is_err());
    }

    #[tokio::test]
    async fn test_worker_applies_events_in_order() {
        let updater = updater();
        let index = updater.index().clone();
        let (dispatcher, receiver) = EventDispatcher::new();

        dispatcher
            .dispatch(SyncEvent::TagsAdded(vec![Tag::new(1, "A")]))
            .unwrap();
        dispatcher
            .dispatch(SyncEvent::DocumentsAdded(vec![document(1, "a.pdf", &[1])]))
            .unwrap();
        dispatcher
            .dispatch(SyncEvent::CanonicalDocumentIds(vec![]))
            .unwrap();
        dispatcher
            .dispatch(SyncEvent::DocumentsAdded(vec![document(2, "b.pdf", &[1])]))
            .unwrap();
        drop(dispatcher);

        run_worker(updater, receiver).await;

        let index = index.read();
        assert!(index.file_by_id("1").is_none());
        assert_eq!(index.files_in(["A"]).len(), 1);
        assert!(index.file_by_display_name("b.2.pdf").is_some());
    }
}
