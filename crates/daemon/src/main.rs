mod cli;

use clap::Parser;

use cli::op::OpContext;
use cli::Command;
use tagfs_daemon::{logging, SourceConfig};

/// Browse a tagged document store as a read-only filesystem
#[derive(Parser, Debug)]
#[command(name = "tagfs", version, about)]
struct Cli {
    /// Default log level; RUST_LOG refines it per target
    #[arg(long, global = true, env = "TAGFS_LOG_LEVEL", default_value = "info")]
    log_level: tracing::Level,

    #[command(flatten)]
    source: SourceConfig,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let ctx = OpContext { source: cli.source };
    tracing::debug!(command = ?cli.command, "running");
    let output = cli.command.run(&ctx).await?;
    println!("{}", output);
    Ok(())
}
