use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use super::{File, FileRef, IndexError, Tag, TagId, TagIndex};

/// Cloneable handle owning the one [`TagIndex`] of a process
///
/// Each mutation holds the write lock for exactly one index call. Readers
/// hold the read lock for the whole of a filesystem request, so they always
/// observe the state as of the most recently completed mutation.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<TagIndex>>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_index(index: TagIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Borrow the index for reading
    pub fn read(&self) -> RwLockReadGuard<'_, TagIndex> {
        self.inner.read()
    }

    pub fn add_file(&self, file: File) -> Result<FileRef, IndexError> {
        self.inner.write().add_file(file)
    }

    pub fn remove_file(&self, id: &str) -> Option<FileRef> {
        self.inner.write().remove_file(id)
    }

    pub fn add_tag(&self, tag: Tag) {
        self.inner.write().add_tag(tag)
    }

    pub fn remove_tag(&self, id: TagId) -> Option<Tag> {
        self.inner.write().remove_tag(id)
    }

    /// Remove files missing from `canonical`, one write per removal
    pub fn prune_files(&self, canonical: &HashSet<String>) -> usize {
        let stale = self.read().stale_file_ids(canonical);
        stale
            .iter()
            .filter(|id| self.remove_file(id).is_some())
            .count()
    }

    /// Remove tags missing from `canonical`, one write per removal
    pub fn prune_tags(&self, canonical: &HashSet<TagId>) -> usize {
        let stale = self.read().stale_tag_ids(canonical);
        stale
            .iter()
            .filter(|id| self.remove_tag(**id).is_some())
            .count()
    }
}
