pub mod op;
pub mod ops;

use clap::Subcommand;

use op::{Op, OpContext};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Mount the tag filesystem and keep it in sync until interrupted
    #[cfg(feature = "fuse")]
    Mount(ops::Mount),
    /// List a tag path without mounting
    Ls(ops::Ls),
    /// Fetch everything from the document store into a snapshot file
    Snapshot(ops::Snapshot),
}

impl Command {
    pub async fn run(&self, ctx: &OpContext) -> anyhow::Result<String> {
        let output = match self {
            #[cfg(feature = "fuse")]
            Command::Mount(op) => op.execute(ctx).await?.to_string(),
            Command::Ls(op) => op.execute(ctx).await?.to_string(),
            Command::Snapshot(op) => op.execute(ctx).await?.to_string(),
        };
        Ok(output)
    }
}
