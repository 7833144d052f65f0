use reqwest::StatusCode;

use common::events::DispatchError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("cannot rebase link onto the configured base URL: {0}")]
    Rebase(String),
    #[error("document listing did not report the ids of all documents")]
    MissingAllIds,
    #[error("API token is not a valid header value")]
    InvalidToken,
    #[error("event queue closed: {0}")]
    Dispatch(#[from] DispatchError),
}
