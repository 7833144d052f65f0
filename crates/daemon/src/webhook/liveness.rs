use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Liveness {
    status: &'static str,
}

/// `GET /_status/livez`; answering at all means the listener is up
#[tracing::instrument]
pub async fn livez() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}
