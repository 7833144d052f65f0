//! Document payloads from the document store and their mapping to [`File`]s

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::index::{File, TagId};

/// A document as delivered by the sync collaborator
///
/// Combines the document record with its media metadata; only the fields
/// the filesystem needs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub archived_file_name: Option<String>,
    #[serde(default)]
    pub archive_media_filename: Option<String>,
    #[serde(default)]
    pub media_filename: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub has_archive_version: bool,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub added: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedDocument {
    #[error("document {id} has no file name")]
    MissingFileName { id: u64 },
    #[error("document {id} has no {field}")]
    MissingMediaPath { id: u64, field: &'static str },
    #[error("document {id} has an invalid {field} timestamp: {value:?}")]
    InvalidTimestamp {
        id: u64,
        field: &'static str,
        value: String,
    },
}

/// Resolves document media paths below the document store's media directory
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Map a document onto the file the index stores
    pub fn to_file(&self, document: &Document) -> Result<File, MalformedDocument> {
        let id = document.id;
        let file_name = [
            &document.archived_file_name,
            &document.archive_media_filename,
            &document.media_filename,
        ]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .ok_or(MalformedDocument::MissingFileName { id })?;

        let real_path = if document.has_archive_version {
            let name = document
                .archive_media_filename
                .as_deref()
                .ok_or(MalformedDocument::MissingMediaPath {
                    id,
                    field: "archive_media_filename",
                })?;
            self.root.join("documents").join("archive").join(name)
        } else {
            let name = document
                .media_filename
                .as_deref()
                .ok_or(MalformedDocument::MissingMediaPath {
                    id,
                    field: "media_filename",
                })?;
            self.root.join("documents").join("originals").join(name)
        };

        let created = parse_timestamp(id, "created", document.created.as_deref())?;
        let added = parse_timestamp(id, "added", document.added.as_deref())?;

        Ok(File::new(
            id.to_string(),
            file_name.clone(),
            real_path,
            created,
            added,
            document.tags.iter().copied(),
        ))
    }
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC)
fn parse_timestamp(
    id: u64,
    field: &'static str,
    value: Option<&str>,
) -> Result<DateTime<Utc>, MalformedDocument> {
    let invalid = || MalformedDocument::InvalidTimestamp {
        id,
        field,
        value: value.unwrap_or_default().to_string(),
    };
    let value = value.ok_or_else(invalid)?;

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Document {
        Document {
            id: 42,
            tags: vec![1, 2],
            archived_file_name: Some("2024-01-01 Invoice.pdf".to_string()),
            archive_media_filename: Some("0000042.pdf".to_string()),
            media_filename: Some("0000042.png".to_string()),
            original_filename: Some("scan.png".to_string()),
            has_archive_version: true,
            created: Some("2024-01-01T00:00:00+01:00".to_string()),
            added: Some("2024-01-02T10:30:00.123456Z".to_string()),
            modified: None,
        }
    }

    #[test]
    fn test_maps_archived_document() {
        let media = MediaRoot::new("/srv/paperless/media");
        let file = media.to_file(&document()).unwrap();

        assert_eq!(file.id, "42");
        assert_eq!(file.display_name, "2024-01-01 Invoice.42.pdf");
        assert_eq!(
            file.real_path,
            PathBuf::from("/srv/paperless/media/documents/archive/0000042.pdf")
        );
        assert_eq!(
            file.created,
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap()
        );
        assert_eq!(file.tags.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_maps_original_when_no_archive() {
        let media = MediaRoot::new("/media");
        let mut doc = document();
        doc.has_archive_version = false;
        doc.archived_file_name = None;
        doc.archive_media_filename = None;

        let file = media.to_file(&doc).unwrap();
        assert_eq!(file.file_name, "0000042.png");
        assert_eq!(
            file.real_path,
            PathBuf::from("/media/documents/originals/0000042.png")
        );
    }

    #[test]
    fn test_accepts_plain_dates() {
        let mut doc = document();
        doc.created = Some("2023-05-17".to_string());
        let file = MediaRoot::new("/media").to_file(&doc).unwrap();
        assert_eq!(
            file.created,
            Utc.with_ymd_and_hms(2023, 5, 17, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_missing_file_name() {
        let mut doc = document();
        doc.archived_file_name = None;
        doc.archive_media_filename = None;
        doc.media_filename = None;

        assert_eq!(
            MediaRoot::new("/media").to_file(&doc),
            Err(MalformedDocument::MissingFileName { id: 42 })
        );
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let mut doc = document();
        doc.added = Some("yesterday".to_string());

        assert!(matches!(
            MediaRoot::new("/media").to_file(&doc),
            Err(MalformedDocument::InvalidTimestamp { field: "added", .. })
        ));
    }

    #[test]
    fn test_deserializes_api_payload() {
        let json = r#"{
            "id": 7,
            "tags": [3],
            "archived_file_name": null,
            "media_filename": "0000007.pdf",
            "created": "2024-02-03",
            "added": "2024-02-04T08:00:00Z",
            "correspondent": 12
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();

        assert!(!doc.has_archive_version);
        let file = MediaRoot::new("/media").to_file(&doc).unwrap();
        assert_eq!(file.display_name, "0000007.7.pdf");
    }
}
