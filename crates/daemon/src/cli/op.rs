use std::fmt::Display;

use tagfs_daemon::SourceConfig;

/// Shared state handed to every subcommand
#[derive(Debug, Clone)]
pub struct OpContext {
    pub source: SourceConfig,
}

/// A CLI subcommand
#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: Display;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}
