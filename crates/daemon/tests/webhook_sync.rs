//! Webhook notifications flowing through the event queue into the index

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::prelude::*;
use tagfs_daemon::api::ApiError;
use tagfs_daemon::webhook::{self, ChangeSource};

/// Serves documents and tags from memory instead of the document store
struct Upstream {
    documents: HashMap<u64, Document>,
    tags: Vec<Tag>,
    events: EventDispatcher,
}

#[async_trait::async_trait]
impl ChangeSource for Upstream {
    async fn document_changed(&self, id: u64) -> Result<(), ApiError> {
        let document = self
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::Rebase(format!("documents/{}/", id)))?;
        self.events.dispatch(SyncEvent::DocumentsAdded(vec![document]))?;
        Ok(())
    }

    async fn documents_deleted(&self) -> Result<(), ApiError> {
        let ids = self.documents.keys().copied().collect();
        self.events.dispatch(SyncEvent::CanonicalDocumentIds(ids))?;
        Ok(())
    }

    async fn tags_changed(&self) -> Result<(), ApiError> {
        let ids = self.tags.iter().map(|tag| tag.id).collect();
        self.events.dispatch(SyncEvent::CanonicalTagIds(ids))?;
        self.events.dispatch(SyncEvent::TagsAdded(self.tags.clone()))?;
        Ok(())
    }
}

fn document(id: u64, tags: &[TagId]) -> Document {
    Document {
        id,
        tags: tags.to_vec(),
        archived_file_name: Some(format!("Letter {}.pdf", id)),
        archive_media_filename: Some(format!("{:07}.pdf", id)),
        media_filename: Some(format!("{:07}.jpg", id)),
        original_filename: None,
        has_archive_version: true,
        created: Some("2024-05-01".to_string()),
        added: Some("2024-05-02T12:00:00Z".to_string()),
        modified: None,
    }
}

async fn post(source: Arc<Upstream>, uri: &str, body: &str) -> StatusCode {
    webhook::router(source)
        .oneshot(Request::post(uri).body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_notifications_update_index() {
    let index = SharedIndex::new();
    let (events, receiver) = EventDispatcher::new();
    let worker = tokio::spawn(run_worker(
        IndexUpdater::new(index.clone(), MediaRoot::new("/media")),
        receiver,
    ));

    let before = Arc::new(Upstream {
        documents: HashMap::from([(1, document(1, &[10])), (2, document(2, &[10, 11]))]),
        tags: vec![Tag::new(10, "letters"), Tag::new(11, "bank")],
        events: events.clone(),
    });

    assert_eq!(post(before.clone(), "/tag/added", "").await, StatusCode::OK);
    for id in [1, 2] {
        let body = format!("https://paperless.local/documents/{}/details", id);
        assert_eq!(
            post(before.clone(), "/document/added", &body).await,
            StatusCode::OK
        );
    }
    // document 3 does not exist upstream
    assert_eq!(
        post(
            before.clone(),
            "/document/updated",
            "https://paperless.local/documents/3/"
        )
        .await,
        StatusCode::INTERNAL_SERVER_ERROR
    );

    // document 2 is deleted, tag "bank" goes with it
    let after = Arc::new(Upstream {
        documents: HashMap::from([(1, document(1, &[10]))]),
        tags: vec![Tag::new(10, "letters")],
        events: events.clone(),
    });
    assert_eq!(post(after.clone(), "/document/deleted", "").await, StatusCode::OK);
    assert_eq!(post(after.clone(), "/tag/deleted", "").await, StatusCode::OK);

    // the worker stops once every dispatcher is gone
    drop(before);
    drop(after);
    drop(events);
    worker.await.unwrap();

    let index = index.read();
    let view = VirtualFsView::new(&index);
    let names: Vec<String> = view.list("/letters").into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["Letter 1.1.pdf"]);
    assert!(view.attributes("/bank").is_err());
    assert!(view.attributes("/Letter 2.2.pdf").is_err());
}
