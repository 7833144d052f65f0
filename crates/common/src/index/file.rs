//! Files and tags as the index stores them

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TagId = u64;

/// Shared handle to an indexed file; the same allocation sits in every map
pub type FileRef = Arc<File>;

/// A tag as reported by the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slug: None,
        }
    }
}

/// A document exposed as a symlink in the virtual filesystem
///
/// Equality and hashing only consider `id`.
#[derive(Debug, Clone)]
pub struct File {
    pub id: String,
    pub file_name: String,
    pub real_path: PathBuf,
    pub created: DateTime<Utc>,
    pub added: DateTime<Utc>,
    pub tags: BTreeSet<TagId>,
    pub display_name: String,
}

impl File {
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        real_path: impl Into<PathBuf>,
        created: DateTime<Utc>,
        added: DateTime<Utc>,
        tags: impl IntoIterator<Item = TagId>,
    ) -> Self {
        let id = id.into();
        let file_name = file_name.into();
        let display_name = display_name(&file_name, &id);
        Self {
            id,
            file_name,
            real_path: real_path.into(),
            created,
            added,
            tags: tags.into_iter().collect(),
            display_name,
        }
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for File {}

impl Hash for File {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Splice `id` between the base name and the extension of `file_name`
///
/// `"scans/invoice.pdf"` with id `"42"` becomes `"invoice.42.pdf"`.
pub fn display_name(file_name: &str, id: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, id, ext.to_string_lossy()),
        None => format!("{}.{}", stem, id),
    }
}
