use std::fmt;

use clap::Args;
use tokio::sync::oneshot;

use tagfs_daemon::{fuse, MountConfig, Service, ServiceError};

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Mount {
    #[command(flatten)]
    pub config: MountConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("mount failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("webhook task failed: {0}")]
    Webhook(#[from] tokio::task::JoinError),
}

#[async_trait::async_trait]
impl Op for Mount {
    type Error = MountError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let service = Service::start(&ctx.source)?;

        // Mount before loading so the tree fills in while documents arrive
        let session = fuse::mount(service.index().clone(), &self.config)?;
        service
            .warm_start(ctx.source.cache_file.as_deref(), self.config.refresh)
            .await?;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let webhook = match self.config.webhook_port {
            Some(port) => Some(service.spawn_webhook(port, async move {
                let _ = stop_rx.await;
            })?),
            None => None,
        };

        tracing::info!("ready; press ctrl-c to unmount");
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutting down");

        let _ = stop_tx.send(());
        if let Some(webhook) = webhook {
            if let Err(e) = webhook.await? {
                tracing::error!("webhook listener failed: {}", e);
            }
        }
        drop(session);
        service.shutdown().await?;

        Ok(format!("unmounted {}", self.config.target.display()))
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mount {}", self.config.target.display())
    }
}
