//! Client for the document store's REST API
//!
//! The client is the sync collaborator of the index: every fetch turns into
//! [`common::events::SyncEvent`]s dispatched to the index worker.

mod client;
mod error;
mod types;

pub use client::DocumentStoreClient;
pub use error::ApiError;
pub use types::{DocumentInfo, DocumentMetadata, Page};
