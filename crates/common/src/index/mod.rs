//! Incrementally maintained index of files and tags
//!
//! [`TagIndex`] keeps five cross-referenced mappings consistent under
//! add/remove operations and answers "which files carry all of these tags"
//! through memoized set intersection. Every mutation either completes or
//! fails before touching any mapping, so readers never see a file that is
//! indexed in one place but not another.
//!
//! [`SharedIndex`] is the single owner handed to both the event worker and
//! the filesystem binding.

mod file;
mod shared;

pub use file::{display_name, File, FileRef, Tag, TagId};
pub use shared::SharedIndex;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::memoized_set::{MemoizedSet, ReadonlyMemoizedSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("file {file_id} references unknown tag id {tag_id}")]
    UnknownTagReference { file_id: String, tag_id: TagId },
}

#[derive(Debug, Default)]
pub struct TagIndex {
    file_by_id: HashMap<String, FileRef>,
    file_by_display_name: HashMap<String, FileRef>,
    files_by_tag_name: HashMap<String, MemoizedSet<FileRef>>,
    all_files: MemoizedSet<FileRef>,

    tags_by_id: HashMap<TagId, Tag>,
    tags_by_name: HashMap<String, Tag>,
    tag_names: BTreeSet<String>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file
    ///
    /// Every tag id must already be known; otherwise nothing is changed and
    /// [`IndexError::UnknownTagReference`] is returned.
    pub fn add_file(&mut self, file: File) -> Result<FileRef, IndexError> {
        let tag_names = file
            .tags
            .iter()
            .map(|tag_id| {
                self.tags_by_id
                    .get(tag_id)
                    .map(|tag| tag.name.clone())
                    .ok_or_else(|| IndexError::UnknownTagReference {
                        file_id: file.id.clone(),
                        tag_id: *tag_id,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.remove_file(&file.id);
        tracing::debug!(id = %file.id, display_name = %file.display_name, "adding file");

        let file = FileRef::new(file);
        self.file_by_display_name
            .insert(file.display_name.clone(), file.clone());
        self.file_by_id.insert(file.id.clone(), file.clone());
        self.all_files.add(file.clone());
        for name in tag_names {
            self.files_by_tag_name
                .entry(name)
                .or_default()
                .add(file.clone());
        }

        Ok(file)
    }

    /// Remove a file by id; absent ids are ignored
    pub fn remove_file(&mut self, id: &str) -> Option<FileRef> {
        let file = self.file_by_id.remove(id)?;
        tracing::debug!(id = %file.id, display_name = %file.display_name, "removing file");

        self.file_by_display_name.remove(&file.display_name);
        self.all_files.delete(&file);
        for tag_id in &file.tags {
            // a tag removed earlier took its file set with it
            let Some(tag) = self.tags_by_id.get(tag_id) else {
                continue;
            };
            if let Some(by_tag) = self.files_by_tag_name.get_mut(&tag.name) {
                by_tag.delete(&file);
            }
        }

        Some(file)
    }

    /// Insert or replace a tag
    ///
    /// A known id that changes its name keeps its file set under the new
    /// name. A different tag currently holding the name is evicted. An id
    /// without a set (new, evicted or removed earlier) gets one rebuilt from
    /// the files that still reference it, so two tags swapping names keep
    /// their files.
    pub fn add_tag(&mut self, tag: Tag) {
        let holder = self
            .tags_by_name
            .get(&tag.name)
            .map(|holder| holder.id)
            .filter(|id| *id != tag.id);
        if let Some(holder) = holder {
            self.remove_tag(holder);
        }

        let carried = self.tags_by_id.remove(&tag.id).and_then(|previous| {
            self.tags_by_name.remove(&previous.name);
            self.tag_names.remove(&previous.name);
            self.files_by_tag_name.remove(&previous.name)
        });

        tracing::debug!(id = tag.id, name = %tag.name, "adding tag");
        let files = carried.unwrap_or_else(|| self.files_tagged(tag.id));
        if !files.is_empty() {
            self.files_by_tag_name.insert(tag.name.clone(), files);
        }
        self.tag_names.insert(tag.name.clone());
        self.tags_by_name.insert(tag.name.clone(), tag.clone());
        self.tags_by_id.insert(tag.id, tag);
    }

    fn files_tagged(&self, id: TagId) -> MemoizedSet<FileRef> {
        self.file_by_id
            .values()
            .filter(|file| file.tags.contains(&id))
            .cloned()
            .collect()
    }

    /// Remove a tag and drop its file set; files keep the tag id
    pub fn remove_tag(&mut self, id: TagId) -> Option<Tag> {
        let tag = self.tags_by_id.remove(&id)?;
        tracing::debug!(id = tag.id, name = %tag.name, "removing tag");

        self.tags_by_name.remove(&tag.name);
        self.tag_names.remove(&tag.name);
        self.files_by_tag_name.remove(&tag.name);
        Some(tag)
    }

    /// Files carrying every tag in `tag_names`
    ///
    /// No tags yields every file; an unknown tag yields an empty set.
    pub fn files_in<'a, I>(&self, tag_names: I) -> ReadonlyMemoizedSet<FileRef>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut files: Option<ReadonlyMemoizedSet<FileRef>> = None;
        for name in tag_names {
            let Some(by_tag) = self.files_by_tag_name.get(name) else {
                return ReadonlyMemoizedSet::empty();
            };
            files = Some(match files {
                Some(files) => files.intersection(by_tag),
                None => self.all_files.intersection(by_tag),
            });
        }

        files.unwrap_or_else(|| self.all_files.snapshot())
    }

    /// Ids of indexed files missing from the authoritative list
    pub fn stale_file_ids(&self, canonical: &HashSet<String>) -> Vec<String> {
        self.file_by_id
            .keys()
            .filter(|id| !canonical.contains(*id))
            .cloned()
            .collect()
    }

    /// Ids of indexed tags missing from the authoritative list
    pub fn stale_tag_ids(&self, canonical: &HashSet<TagId>) -> Vec<TagId> {
        self.tags_by_id
            .keys()
            .filter(|id| !canonical.contains(*id))
            .copied()
            .collect()
    }

    /// Remove every file whose id is not in `canonical`, returning how many
    pub fn prune_files(&mut self, canonical: &HashSet<String>) -> usize {
        let stale = self.stale_file_ids(canonical);
        for id in &stale {
            self.remove_file(id);
        }
        stale.len()
    }

    /// Remove every tag whose id is not in `canonical`, returning how many
    pub fn prune_tags(&mut self, canonical: &HashSet<TagId>) -> usize {
        let stale = self.stale_tag_ids(canonical);
        for id in &stale {
            self.remove_tag(*id);
        }
        stale.len()
    }

    pub fn file_by_id(&self, id: &str) -> Option<&FileRef> {
        self.file_by_id.get(id)
    }

    pub fn file_by_display_name(&self, display_name: &str) -> Option<&FileRef> {
        self.file_by_display_name.get(display_name)
    }

    pub fn tag_by_id(&self, id: TagId) -> Option<&Tag> {
        self.tags_by_id.get(&id)
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&Tag> {
        self.tags_by_name.get(name)
    }

    /// Known tag names in sorted order
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tag_names.iter().map(String::as_str)
    }

    pub fn files_by_tag(&self, name: &str) -> Option<&MemoizedSet<FileRef>> {
        self.files_by_tag_name.get(name)
    }

    pub fn all_files(&self) -> &MemoizedSet<FileRef> {
        &self.all_files
    }

    pub fn file_count(&self) -> usize {
        self.file_by_id.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags_by_id.len()
    }
}
