use std::fmt;
use std::path::PathBuf;

use clap::Args;

use common::view::{EntryKind, ViewError, VirtualFsView};
use tagfs_daemon::{Service, ServiceError};

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Tag path to list, e.g. /taxes/2023
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Debug)]
pub enum LsEntry {
    Directory(String),
    Symlink(String, PathBuf),
}

#[derive(Debug)]
pub struct LsOutput {
    pub entries: Vec<LsEntry>,
}

impl fmt::Display for LsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entry in &self.entries {
            if !first {
                writeln!(f)?;
            }
            first = false;
            match entry {
                LsEntry::Directory(name) => write!(f, "{}/", name)?,
                LsEntry::Symlink(name, target) => write!(f, "{} -> {}", name, target.display())?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    View(#[from] ViewError),
}

#[async_trait::async_trait]
impl Op for Ls {
    type Error = LsError;
    type Output = LsOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let service = Service::start(&ctx.source)?;
        service
            .warm_start(ctx.source.cache_file.as_deref(), false)
            .await?;
        let index = service.shutdown().await?;

        let index = index.read();
        let view = VirtualFsView::new(&index);

        if view.attributes(&self.path)?.kind == EntryKind::Symlink {
            let name = common::view::segments(&self.path)
                .last()
                .unwrap_or_default()
                .to_string();
            let target = view.resolve_link(&self.path)?.to_path_buf();
            return Ok(LsOutput {
                entries: vec![LsEntry::Symlink(name, target)],
            });
        }

        let mut entries = Vec::new();
        for entry in view.list(&self.path) {
            entries.push(match entry.kind {
                EntryKind::Directory => LsEntry::Directory(entry.name),
                EntryKind::Symlink => {
                    let path = format!("{}/{}", self.path.trim_end_matches('/'), entry.name);
                    let target = view.resolve_link(&path)?.to_path_buf();
                    LsEntry::Symlink(entry.name, target)
                }
            });
        }
        Ok(LsOutput { entries })
    }
}

impl fmt::Display for Ls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ls {}", self.path)
    }
}
