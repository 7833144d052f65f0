//! Webhook listener for document store change notifications
//!
//! Each notification triggers a targeted refresh through a [`ChangeSource`];
//! the refreshed data reaches the index as sync events. Bodies are answered
//! with `{}` and the status carries the outcome.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use regex::Regex;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api::{ApiError, DocumentStoreClient};

mod liveness;

/// Refreshes triggered by webhook notifications
#[async_trait::async_trait]
pub trait ChangeSource: Send + Sync + 'static {
    /// A document was created or updated
    async fn document_changed(&self, id: u64) -> Result<(), ApiError>;

    /// Some document was deleted; the payload does not say which
    async fn documents_deleted(&self) -> Result<(), ApiError>;

    /// A tag was created, modified or deleted
    async fn tags_changed(&self) -> Result<(), ApiError>;
}

#[async_trait::async_trait]
impl ChangeSource for DocumentStoreClient {
    async fn document_changed(&self, id: u64) -> Result<(), ApiError> {
        self.fetch_document(id).await.map(|_| ())
    }

    async fn documents_deleted(&self) -> Result<(), ApiError> {
        self.refresh_document_ids().await.map(|_| ())
    }

    async fn tags_changed(&self) -> Result<(), ApiError> {
        self.refresh_tags().await.map(|_| ())
    }
}

pub type WebhookState = Arc<dyn ChangeSource>;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("no document id in webhook body: {0:?}")]
    MissingDocumentId(String),
    #[error("refresh failed: {0}")]
    Refresh(#[from] ApiError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        tracing::error!("webhook failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({}))).into_response()
    }
}

fn ok() -> Response {
    (StatusCode::OK, Json(serde_json::json!({}))).into_response()
}

/// Extract the document id from a body such as
/// `https://docs.example.com/documents/42/details`
pub fn document_id(body: &str) -> Option<u64> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"documents/(\d+)/").ok())
        .as_ref()?;
    pattern.captures(body)?.get(1)?.as_str().parse().ok()
}

#[tracing::instrument(skip(source, body))]
async fn document_changed(
    State(source): State<WebhookState>,
    body: String,
) -> Result<Response, WebhookError> {
    let id = document_id(&body).ok_or(WebhookError::MissingDocumentId(body))?;
    tracing::info!(document = id, "document changed");
    source.document_changed(id).await?;
    Ok(ok())
}

#[tracing::instrument(skip(source))]
async fn documents_deleted(State(source): State<WebhookState>) -> Result<Response, WebhookError> {
    source.documents_deleted().await?;
    Ok(ok())
}

#[tracing::instrument(skip(source))]
async fn tags_changed(State(source): State<WebhookState>) -> Result<Response, WebhookError> {
    source.tags_changed().await?;
    Ok(ok())
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({}))).into_response()
}

pub fn router(source: WebhookState) -> Router {
    Router::new()
        .route("/document/added", post(document_changed))
        .route("/document/updated", post(document_changed))
        .route("/document/deleted", post(documents_deleted))
        .route("/tag/added", post(tags_changed))
        .route("/tag/modified", post(tags_changed))
        .route("/tag/deleted", post(tags_changed))
        .route("/_status/livez", get(liveness::livez))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(source)
}

/// Serve webhooks on `0.0.0.0:<port>` until `shutdown` resolves
pub async fn serve(
    port: u16,
    source: WebhookState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(address).await?;
    tracing::info!(%address, "listening for webhooks");

    axum::serve(listener, router(source))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("webhook listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Document(u64),
        Deleted,
        Tags,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl Recorder {
        fn record(&self, call: Call) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(call);
            if self.fail {
                Err(ApiError::Rebase("unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl ChangeSource for Recorder {
        async fn document_changed(&self, id: u64) -> Result<(), ApiError> {
            self.record(Call::Document(id))
        }

        async fn documents_deleted(&self) -> Result<(), ApiError> {
            self.record(Call::Deleted)
        }

        async fn tags_changed(&self) -> Result<(), ApiError> {
            self.record(Call::Tags)
        }
    }

    async fn post_to(recorder: Arc<Recorder>, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
        let response = router(recorder)
            .oneshot(
                Request::post(uri)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[test]
    fn test_document_id() {
        assert_eq!(
            document_id("https://docs.example.com/documents/42/details"),
            Some(42)
        );
        assert_eq!(document_id("documents/7/"), Some(7));
        assert_eq!(document_id("documents//"), None);
        assert_eq!(document_id("nothing here"), None);
    }

    #[tokio::test]
    async fn test_routes_trigger_refreshes() {
        let recorder = Arc::new(Recorder::default());

        for (uri, body) in [
            ("/document/added", "http://paperless/documents/12/details"),
            ("/document/updated", "http://paperless/documents/13/"),
            ("/document/deleted", ""),
            ("/tag/modified", ""),
        ] {
            let (status, body) = post_to(recorder.clone(), uri, body).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(&body[..], b"{}");
        }

        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                Call::Document(12),
                Call::Document(13),
                Call::Deleted,
                Call::Tags
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let recorder = Arc::new(Recorder::default());
        let (status, body) = post_to(recorder.clone(), "/correspondent/added", "").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(&body[..], b"{}");
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_500() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let (status, body) = post_to(recorder.clone(), "/tag/added", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body[..], b"{}");

        let (status, _) = post_to(recorder.clone(), "/document/added", "no id").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(recorder.calls.lock().unwrap().len(), 1);
    }
}
