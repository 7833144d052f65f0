//! Tracing subscriber setup

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// `level` is the default directive; `RUST_LOG` refines it per target.
/// Calling this more than once is harmless.
pub fn init(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
