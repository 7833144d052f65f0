//! Configuration shared by every subcommand
//!
//! Values come from command-line flags with `TAGFS_*` environment fallbacks.

use std::path::PathBuf;

use clap::Args;
use url::Url;

/// Where documents and tags come from
#[derive(Args, Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the document store (e.g. https://paperless.example.com)
    #[arg(long, env = "TAGFS_BASE_URL", global = true)]
    pub base_url: Option<Url>,

    /// API token sent as `Authorization: Token <token>`
    #[arg(long, env = "TAGFS_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Skip TLS certificate verification for the document store
    #[arg(long, env = "TAGFS_ACCEPT_INVALID_CERTS", global = true)]
    pub accept_invalid_certs: bool,

    /// Media directory of the document store; symlinks point below it
    #[arg(long, env = "TAGFS_MEDIA_ROOT", global = true, default_value = ".")]
    pub media_root: PathBuf,

    /// JSON snapshot used to warm-start the index; written after a full fetch
    #[arg(long, env = "TAGFS_CACHE_FILE", global = true)]
    pub cache_file: Option<PathBuf>,
}

/// Connection details for the document store API
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub token: String,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("--base-url and --token (or TAGFS_BASE_URL and TAGFS_TOKEN) are required")]
    MissingRemote,
    #[error("no document source: configure the document store or an existing --cache-file")]
    NoSource,
}

impl SourceConfig {
    /// Remote settings, if both the URL and the token are present
    pub fn remote(&self) -> Option<RemoteConfig> {
        match (&self.base_url, &self.token) {
            (Some(base_url), Some(token)) => Some(RemoteConfig {
                base_url: base_url.clone(),
                token: token.clone(),
                accept_invalid_certs: self.accept_invalid_certs,
            }),
            _ => None,
        }
    }

    pub fn require_remote(&self) -> Result<RemoteConfig, ConfigError> {
        self.remote().ok_or(ConfigError::MissingRemote)
    }
}

/// Settings of the FUSE mount and the webhook listener
#[derive(Args, Debug, Clone)]
pub struct MountConfig {
    /// Directory to mount the filesystem on
    #[arg(env = "TAGFS_TARGET_DIR")]
    pub target: PathBuf,

    /// Port for document store webhooks; disabled when unset
    #[arg(long, env = "TAGFS_WEBHOOK_PORT")]
    pub webhook_port: Option<u16>,

    /// Let other users access the mount (needs user_allow_other in fuse.conf)
    #[arg(long, env = "TAGFS_ALLOW_OTHER")]
    pub allow_other: bool,

    /// Unmount automatically when the process exits (requires --allow-other)
    #[arg(long, env = "TAGFS_AUTO_UNMOUNT")]
    pub auto_unmount: bool,

    /// Fetch everything from the document store even after a snapshot warm start
    #[arg(long, env = "TAGFS_REFRESH")]
    pub refresh: bool,
}
