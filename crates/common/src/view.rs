//! Read-only filesystem view over a [`TagIndex`]
//!
//! A path is an unordered set of tag names. Listing a directory yields the
//! tags that would narrow its file set further, followed by the files that
//! carry every tag on the path. Files appear as symlinks to their real
//! location on disk.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::index::{FileRef, TagIndex};

/// Permission bits of synthetic directories
pub const DIR_PERM: u16 = 0o555;
/// Permission bits of file symlinks
pub const SYMLINK_PERM: u16 = 0o444;
/// Size reported for synthetic directories
pub const DIR_SIZE: u64 = 12;

static STARTED_AT: OnceLock<DateTime<Utc>> = OnceLock::new();

/// Timestamp shared by every synthetic directory
fn started_at() -> DateTime<Utc> {
    *STARTED_AT.get_or_init(Utc::now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::Directory,
        }
    }

    fn symlink(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::Symlink,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub kind: EntryKind,
    pub perm: u16,
    pub size: u64,
    pub nlink: u32,
    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
}

impl Attributes {
    fn directory() -> Self {
        let at = started_at();
        Self {
            kind: EntryKind::Directory,
            perm: DIR_PERM,
            size: DIR_SIZE,
            nlink: 1,
            atime: at,
            mtime: at,
            ctime: at,
        }
    }

    fn symlink(file: &FileRef) -> Self {
        Self {
            kind: EntryKind::Symlink,
            perm: SYMLINK_PERM,
            size: file.real_path.as_os_str().len() as u64,
            nlink: 1,
            atime: file.added,
            mtime: file.created,
            ctime: file.created,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("no such entry: {0}")]
    NotFound(String),
}

/// Non-empty components of a slash-delimited path
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Stateless adapter from paths to index queries
#[derive(Debug, Clone, Copy)]
pub struct VirtualFsView<'a> {
    index: &'a TagIndex,
}

impl<'a> VirtualFsView<'a> {
    pub fn new(index: &'a TagIndex) -> Self {
        Self { index }
    }

    /// Directory listing: narrowing tags first, then file display names
    ///
    /// Files are every file carrying all tags of the path, so `/` lists every
    /// file and `/B` lists files tagged `B` even when they carry more tags.
    /// Both groups are sorted by name. A path naming an unknown tag lists
    /// nothing.
    pub fn list(&self, path: &str) -> Vec<DirEntry> {
        let tags: BTreeSet<&str> = segments(path).collect();
        let files = self.index.files_in(tags.iter().copied());

        let mut entries: Vec<DirEntry> = self
            .index
            .tag_names()
            .filter(|name| !tags.contains(name))
            .filter(|name| {
                self.index
                    .files_by_tag(name)
                    .is_some_and(|by_tag| !by_tag.intersection(&files).is_empty())
            })
            .map(DirEntry::directory)
            .collect();

        let mut names: Vec<&str> = files.iter().map(|f| f.display_name.as_str()).collect();
        names.sort_unstable();
        entries.extend(names.into_iter().map(DirEntry::symlink));
        entries
    }

    pub fn attributes(&self, path: &str) -> Result<Attributes, ViewError> {
        let Some(name) = segments(path).last() else {
            return Ok(Attributes::directory());
        };
        if self.index.tag_by_name(name).is_some() {
            return Ok(Attributes::directory());
        }

        self.index
            .file_by_display_name(name)
            .map(Attributes::symlink)
            .ok_or_else(|| ViewError::NotFound(path.to_string()))
    }

    /// Target of the symlink at `path`
    pub fn resolve_link(&self, path: &str) -> Result<&'a Path, ViewError> {
        segments(path)
            .last()
            .and_then(|name| self.index.file_by_display_name(name))
            .map(|file| file.real_path.as_path())
            .ok_or_else(|| ViewError::NotFound(path.to_string()))
    }
}
