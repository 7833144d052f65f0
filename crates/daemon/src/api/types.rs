//! Wire types of the document store API

use serde::{Deserialize, Serialize};

use common::document::Document;
use common::index::TagId;

/// One page of a paginated listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    pub next: Option<String>,
    pub results: Vec<T>,
    /// Every id matching the query, across all pages
    #[serde(default)]
    pub all: Option<Vec<u64>>,
}

/// `GET documents/<id>/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: u64,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub archived_file_name: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub added: Option<String>,
}

/// `GET documents/<id>/metadata/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub media_filename: Option<String>,
    #[serde(default)]
    pub archive_media_filename: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub has_archive_version: bool,
}

impl DocumentInfo {
    pub fn with_metadata(self, metadata: DocumentMetadata) -> Document {
        Document {
            id: self.id,
            tags: self.tags,
            archived_file_name: self.archived_file_name,
            archive_media_filename: metadata.archive_media_filename,
            media_filename: metadata.media_filename,
            original_filename: metadata.original_filename,
            has_archive_version: metadata.has_archive_version,
            created: self.created,
            added: self.added,
            modified: self.modified,
        }
    }
}
