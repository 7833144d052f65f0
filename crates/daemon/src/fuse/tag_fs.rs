//! `fuser::Filesystem` over the virtual tag view

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, Request,
};
use libc::ENOENT;

use common::index::SharedIndex;
use common::view::{Attributes, EntryKind, ViewError, VirtualFsView};

use super::inode_table::InodeTable;

/// How long the kernel may cache entries and attributes
const TTL: Duration = Duration::from_secs(1);

const BLOCK_SIZE: u32 = 512;

/// Inode reported for readdir entries the kernel has not looked up yet
const UNKNOWN_INODE: u64 = 0xffff_ffff;

/// Owner reported for every entry: whoever is asking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owner {
    uid: u32,
    gid: u32,
}

impl Owner {
    fn of(req: &Request<'_>) -> Self {
        Self {
            uid: req.uid(),
            gid: req.gid(),
        }
    }
}

/// Read-only FUSE filesystem backed by a [`SharedIndex`]
///
/// Each request takes the index read lock once, so a request never observes
/// a half-applied sync event.
pub struct TagFs {
    index: SharedIndex,
    inodes: InodeTable,
}

impl TagFs {
    pub fn new(index: SharedIndex) -> Self {
        Self {
            index,
            inodes: InodeTable::new(),
        }
    }

    fn file_attr(ino: u64, attributes: &Attributes, owner: Owner) -> FileAttr {
        FileAttr {
            ino,
            size: attributes.size,
            blocks: attributes.size.div_ceil(BLOCK_SIZE as u64),
            atime: SystemTime::from(attributes.atime),
            mtime: SystemTime::from(attributes.mtime),
            ctime: SystemTime::from(attributes.ctime),
            crtime: SystemTime::from(attributes.ctime),
            kind: file_type(attributes.kind),
            perm: attributes.perm,
            nlink: attributes.nlink,
            uid: owner.uid,
            gid: owner.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn path_of(&self, ino: u64) -> Result<String, i32> {
        self.inodes
            .get_path(ino)
            .map(str::to_string)
            .ok_or(ENOENT)
    }

    fn attributes(&self, path: &str) -> Result<Attributes, i32> {
        let index = self.index.read();
        VirtualFsView::new(&index).attributes(path).map_err(errno)
    }

    /// Resolve `name` in `parent`, counting one kernel lookup on success
    fn lookup_child(
        &mut self,
        parent: u64,
        name: &OsStr,
        owner: Owner,
    ) -> Result<FileAttr, i32> {
        let parent = self.path_of(parent)?;
        let name = name.to_str().ok_or(ENOENT)?;
        let path = InodeTable::join(&parent, name);

        match self.attributes(&path) {
            Ok(attributes) => {
                let ino = self.inodes.lookup(&path);
                Ok(Self::file_attr(ino, &attributes, owner))
            }
            Err(code) => {
                // the entry is gone upstream
                self.inodes.remove_by_path(&path);
                Err(code)
            }
        }
    }

    fn stat_inode(&self, ino: u64, owner: Owner) -> Result<FileAttr, i32> {
        let path = self.path_of(ino)?;
        let attributes = self.attributes(&path)?;
        Ok(Self::file_attr(ino, &attributes, owner))
    }

    /// Directory entries of `ino`, including `.` and `..`
    ///
    /// Entries the kernel has not looked up are reported with a placeholder
    /// inode; listing a directory never grows the inode table.
    fn entries(&self, ino: u64) -> Result<Vec<(u64, FileType, String)>, i32> {
        let path = self.path_of(ino)?;
        let listing = {
            let index = self.index.read();
            let view = VirtualFsView::new(&index);
            if view.attributes(&path).map_err(errno)?.kind != EntryKind::Directory {
                return Err(libc::ENOTDIR);
            }
            view.list(&path)
        };

        let known = |path: &str| self.inodes.get_inode(path).unwrap_or(UNKNOWN_INODE);
        let parent = known(&InodeTable::parent_path(&path));
        let mut entries = Vec::with_capacity(listing.len() + 2);
        entries.push((ino, FileType::Directory, ".".to_string()));
        entries.push((parent, FileType::Directory, "..".to_string()));
        for entry in listing {
            let child = known(&InodeTable::join(&path, &entry.name));
            entries.push((child, file_type(entry.kind), entry.name));
        }
        Ok(entries)
    }

    fn link_target(&self, ino: u64) -> Result<Vec<u8>, i32> {
        let path = self.path_of(ino)?;
        let index = self.index.read();
        let target: &Path = VirtualFsView::new(&index)
            .resolve_link(&path)
            .map_err(errno)?;
        Ok(target.as_os_str().as_bytes().to_vec())
    }
}

fn file_type(kind: EntryKind) -> FileType {
    match kind {
        EntryKind::Directory => FileType::Directory,
        EntryKind::Symlink => FileType::Symlink,
    }
}

fn errno(error: ViewError) -> i32 {
    match error {
        ViewError::NotFound(path) => {
            tracing::trace!(%path, "not found");
            ENOENT
        }
    }
}

impl Filesystem for TagFs {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_child(parent, name, Owner::of(req)) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(code) => reply.error(code),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.stat_inode(ino, Owner::of(req)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(code) => reply.error(code),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        match self.link_target(ino) {
            Ok(target) => reply.data(&target),
            Err(code) => reply.error(code),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.entries(ino) {
            Ok(entries) => entries,
            Err(code) => {
                reply.error(code);
                return;
            }
        };

        for (i, (child, kind, name)) in entries
            .into_iter()
            .enumerate()
            .skip(offset.max(0) as usize)
        {
            // true once the reply buffer is full
            if reply.add(child, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use common::index::{File, Tag};

    use super::*;

    const OWNER: Owner = Owner {
        uid: 1000,
        gid: 100,
    };

    fn fs() -> TagFs {
        let index = SharedIndex::new();
        index.add_tag(Tag::new(1, "taxes"));
        index.add_tag(Tag::new(2, "2023"));
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        index
            .add_file(File::new("7", "receipt.pdf", "/media/a/7.pdf", at, at, [1, 2]))
            .unwrap();
        TagFs::new(index)
    }

    #[test]
    fn test_lookup_and_stat() {
        let mut fs = fs();

        let dir = fs
            .lookup_child(InodeTable::ROOT_INODE, OsStr::new("taxes"), OWNER)
            .unwrap();
        assert_eq!(dir.kind, FileType::Directory);
        assert_eq!(dir.perm, 0o555);

        let link = fs
            .lookup_child(dir.ino, OsStr::new("receipt.7.pdf"), OWNER)
            .unwrap();
        assert_eq!(link.kind, FileType::Symlink);
        assert_eq!(link.size, "/media/a/7.pdf".len() as u64);
        assert_eq!(fs.stat_inode(link.ino, OWNER).unwrap().ino, link.ino);

        assert_eq!(
            fs.lookup_child(dir.ino, OsStr::new("missing"), OWNER)
                .unwrap_err(),
            ENOENT
        );
        assert_eq!(fs.stat_inode(999, OWNER).unwrap_err(), ENOENT);
    }

    #[test]
    fn test_entries_include_dot_entries() {
        let mut fs = fs();
        let taxes = fs
            .lookup_child(InodeTable::ROOT_INODE, OsStr::new("taxes"), OWNER)
            .unwrap();

        let entries = fs.entries(taxes.ino).unwrap();
        let names: Vec<&str> = entries.iter().map(|(_, _, name)| name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "2023", "receipt.7.pdf"]);
        assert_eq!(entries[0].0, taxes.ino);
        assert_eq!(entries[1].0, InodeTable::ROOT_INODE);
        assert_eq!(entries[3].0, UNKNOWN_INODE);

        let link = fs
            .lookup_child(taxes.ino, OsStr::new("receipt.7.pdf"), OWNER)
            .unwrap();
        assert_eq!(fs.entries(taxes.ino).unwrap()[3].0, link.ino);
        assert_eq!(fs.entries(link.ino).unwrap_err(), libc::ENOTDIR);
    }

    #[test]
    fn test_link_target() {
        let mut fs = fs();
        let link = fs
            .lookup_child(InodeTable::ROOT_INODE, OsStr::new("receipt.7.pdf"), OWNER)
            .unwrap();
        assert_eq!(fs.link_target(link.ino).unwrap(), b"/media/a/7.pdf".to_vec());

        let dir = fs
            .lookup_child(InodeTable::ROOT_INODE, OsStr::new("2023"), OWNER)
            .unwrap();
        assert_eq!(fs.link_target(dir.ino).unwrap_err(), ENOENT);
    }

    #[test]
    fn test_removed_file_disappears() {
        let mut fs = fs();
        let link = fs
            .lookup_child(InodeTable::ROOT_INODE, OsStr::new("receipt.7.pdf"), OWNER)
            .unwrap();

        fs.index.remove_file("7");
        assert_eq!(fs.stat_inode(link.ino, OWNER).unwrap_err(), ENOENT);

        // looking it up again releases the stale inode
        assert_eq!(
            fs.lookup_child(InodeTable::ROOT_INODE, OsStr::new("receipt.7.pdf"), OWNER)
                .unwrap_err(),
            ENOENT
        );
        assert_eq!(fs.inodes.get_path(link.ino), None);
    }

    #[test]
    fn test_attributes_belong_to_caller() {
        let mut fs = fs();
        let dir = fs
            .lookup_child(InodeTable::ROOT_INODE, OsStr::new("taxes"), OWNER)
            .unwrap();
        assert_eq!((dir.uid, dir.gid), (1000, 100));

        let other = Owner { uid: 0, gid: 0 };
        let attr = fs.stat_inode(dir.ino, other).unwrap();
        assert_eq!((attr.uid, attr.gid), (0, 0));
    }

    #[test]
    fn test_forgotten_lookups_release_inodes() {
        let mut fs = fs();
        let before = fs.inodes.len();

        for _ in 0..10 {
            let dir = fs
                .lookup_child(InodeTable::ROOT_INODE, OsStr::new("taxes"), OWNER)
                .unwrap();
            fs.entries(dir.ino).unwrap();
            let link = fs
                .lookup_child(dir.ino, OsStr::new("receipt.7.pdf"), OWNER)
                .unwrap();
            fs.inodes.forget(link.ino, 1);
            fs.inodes.forget(dir.ino, 1);
        }

        assert_eq!(fs.inodes.len(), before);
    }
}
