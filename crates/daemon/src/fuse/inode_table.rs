//! Inode numbers for virtual paths
//!
//! The same file can appear under many tag paths, and `/a/b` and `/b/a` list
//! the same entries, yet the kernel expects each path to keep its inode for
//! as long as it is cached. Paths are numbered when the kernel looks them up
//! and released once it forgets every lookup.

use std::collections::HashMap;

use common::view::segments;

/// Bidirectional mapping between inodes and normalized paths
#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    inode_to_path: HashMap<u64, String>,
    /// Lookups the kernel has not forgotten yet, per inode
    lookups: HashMap<u64, u64>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            lookups: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };
        table.path_to_inode.insert("/".to_string(), Self::ROOT_INODE);
        table.inode_to_path.insert(Self::ROOT_INODE, "/".to_string());
        table
    }

    pub fn get_or_create(&mut self, path: &str) -> u64 {
        let normalized = normalize(path);
        if let Some(&inode) = self.path_to_inode.get(&normalized) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(normalized.clone(), inode);
        self.inode_to_path.insert(inode, normalized);
        inode
    }

    /// Number `path` on behalf of a kernel lookup
    ///
    /// Every call must eventually be matched by a [`forget`](Self::forget).
    pub fn lookup(&mut self, path: &str) -> u64 {
        let inode = self.get_or_create(path);
        *self.lookups.entry(inode).or_insert(0) += 1;
        inode
    }

    /// Drop `n` lookups of `inode`, releasing it once none are left
    ///
    /// The root inode is never released.
    pub fn forget(&mut self, inode: u64, n: u64) {
        let Some(count) = self.lookups.get_mut(&inode) else {
            return;
        };
        *count = count.saturating_sub(n);
        if *count == 0 {
            self.lookups.remove(&inode);
            self.remove(inode);
        }
    }

    /// Release `inode` regardless of outstanding lookups
    pub fn remove(&mut self, inode: u64) -> Option<String> {
        if inode == Self::ROOT_INODE {
            return None;
        }
        let path = self.inode_to_path.remove(&inode)?;
        self.path_to_inode.remove(&path);
        self.lookups.remove(&inode);
        Some(path)
    }

    pub fn remove_by_path(&mut self, path: &str) -> Option<u64> {
        let inode = self.get_inode(path)?;
        self.remove(inode).map(|_| inode)
    }

    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(&normalize(path)).copied()
    }

    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inode_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inode_to_path.is_empty()
    }

    /// Path of `name` inside the directory at `parent`
    pub fn join(parent: &str, name: &str) -> String {
        normalize(&format!("{}/{}", parent, name))
    }

    pub fn parent_path(path: &str) -> String {
        let normalized = normalize(path);
        match normalized.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(pos) => normalized[..pos].to_string(),
        }
    }
}

/// Leading slash, no trailing or repeated slashes
fn normalize(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in segments(path.trim()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}
