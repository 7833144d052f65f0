// Sync collaborators
pub mod api;
pub mod snapshot;
pub mod webhook;

// Process wiring
pub mod config;
#[cfg(feature = "fuse")]
pub mod fuse;
pub mod logging;
pub mod service;

pub use config::{ConfigError, MountConfig, RemoteConfig, SourceConfig};
pub use service::{Service, ServiceError};
