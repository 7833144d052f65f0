pub mod ls;
#[cfg(feature = "fuse")]
pub mod mount;
pub mod snapshot;

pub use ls::Ls;
#[cfg(feature = "fuse")]
pub use mount::Mount;
pub use snapshot::Snapshot;
