use std::fmt;
use std::path::PathBuf;

use clap::Args;

use tagfs_daemon::{ConfigError, Service, ServiceError};

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Snapshot {
    /// Where to write the snapshot; defaults to --cache-file
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotOpError {
    #[error("no output path: pass one or set --cache-file")]
    NoOutput,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[async_trait::async_trait]
impl Op for Snapshot {
    type Error = SnapshotOpError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let output = self
            .output
            .clone()
            .or_else(|| ctx.source.cache_file.clone())
            .ok_or(SnapshotOpError::NoOutput)?;
        ctx.source.require_remote()?;

        let service = Service::start(&ctx.source)?;
        let client = service.client().ok_or(ConfigError::MissingRemote)?;
        let snapshot = client.refresh_all().await.map_err(ServiceError::from)?;
        snapshot
            .save(&output)
            .await
            .map_err(ServiceError::from)?;
        service.shutdown().await?;

        Ok(format!(
            "wrote {} documents and {} tags to {}",
            snapshot.documents.len(),
            snapshot.tags.len(),
            output.display()
        ))
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.output {
            Some(path) => write!(f, "snapshot {}", path.display()),
            None => write!(f, "snapshot"),
        }
    }
}
