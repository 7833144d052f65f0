//! FUSE binding of the virtual tag filesystem
//!
//! - `TagFs`: `fuser::Filesystem` answering lookup, forget, getattr, readdir and
//!   readlink from the shared index
//! - `InodeTable`: inode numbers for looked-up paths, released on forget
//!
//! The mount is read-only; every other operation gets fuser's default reply.

mod inode_table;
mod tag_fs;

use std::io;

use fuser::{BackgroundSession, MountOption};

use common::index::SharedIndex;

use crate::config::MountConfig;

pub use inode_table::InodeTable;
pub use tag_fs::TagFs;

/// Mount the index at `config.target` on a background session thread
///
/// Dropping the returned session unmounts the filesystem.
pub fn mount(index: SharedIndex, config: &MountConfig) -> io::Result<BackgroundSession> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName("tagfs".to_string()),
        MountOption::Subtype("tagfs".to_string()),
    ];
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }

    let session = fuser::spawn_mount2(TagFs::new(index), &config.target, &options)?;
    tracing::info!(mountpoint = %config.target.display(), "filesystem mounted");
    Ok(session)
}
