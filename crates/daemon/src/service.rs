//! Wiring of index, event worker, document store client and webhook
//!
//! Everything that writes to the index goes through the service's event
//! queue; the single worker task spawned by [`Service::start`] applies the
//! events in arrival order.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;

use common::document::MediaRoot;
use common::events::{run_worker, EventDispatcher, IndexUpdater};
use common::index::SharedIndex;

use crate::api::{ApiError, DocumentStoreClient};
use crate::config::{ConfigError, SourceConfig};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::webhook;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("document store: {0}")]
    Api(#[from] ApiError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("index worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub struct Service {
    index: SharedIndex,
    dispatcher: EventDispatcher,
    worker: JoinHandle<()>,
    client: Option<DocumentStoreClient>,
}

impl Service {
    /// Spawn the index worker; the client exists only if a remote is configured
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(source: &SourceConfig) -> Result<Self, ServiceError> {
        let index = SharedIndex::new();
        let (dispatcher, receiver) = EventDispatcher::new();

        let updater = IndexUpdater::new(index.clone(), MediaRoot::new(&source.media_root));
        let worker = tokio::spawn(run_worker(updater, receiver));

        let client = source
            .remote()
            .map(|remote| DocumentStoreClient::new(&remote, dispatcher.clone()))
            .transpose()?;

        Ok(Self {
            index,
            dispatcher,
            worker,
            client,
        })
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn client(&self) -> Option<&DocumentStoreClient> {
        self.client.as_ref()
    }

    /// Populate the index
    ///
    /// An existing cache file is replayed first. The document store is
    /// queried when there is no cache file yet or `refresh` is set; a full
    /// fetch is written back to the cache file when one is configured.
    pub async fn warm_start(
        &self,
        cache_file: Option<&Path>,
        refresh: bool,
    ) -> Result<(), ServiceError> {
        let cached = match cache_file {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
                Snapshot::load(path).await?.replay(&self.dispatcher)?;
                true
            }
            _ => false,
        };

        if cached && !refresh {
            return Ok(());
        }

        let Some(client) = &self.client else {
            if cached {
                tracing::warn!("refresh requested but no document store is configured");
                return Ok(());
            }
            return Err(ConfigError::NoSource.into());
        };

        let snapshot = client.refresh_all().await?;
        if let Some(path) = cache_file {
            snapshot.save(path).await?;
        }
        Ok(())
    }

    /// Serve webhooks on `port` until `shutdown` resolves
    pub fn spawn_webhook(
        &self,
        port: u16,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<JoinHandle<std::io::Result<()>>, ServiceError> {
        let client = self.client.clone().ok_or(ConfigError::MissingRemote)?;
        let source: webhook::WebhookState = Arc::new(client);
        Ok(tokio::spawn(webhook::serve(port, source, shutdown)))
    }

    /// Close the event queue and wait until every queued event is applied
    ///
    /// Dispatchers handed out elsewhere (webhook tasks) keep the worker
    /// alive, so stop those first.
    pub async fn shutdown(self) -> Result<SharedIndex, ServiceError> {
        let Self {
            index,
            dispatcher,
            worker,
            client,
        } = self;
        drop(client);
        drop(dispatcher);
        worker.await?;
        Ok(index)
    }
}
