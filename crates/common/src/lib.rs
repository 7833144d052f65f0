//! Tag-indexed document filesystem core
//!
//! - [`memoized_set`]: sets with identity-cached intersection/difference
//! - [`index`]: the file/tag index and its shared owner
//! - [`view`]: list, stat and readlink over the index
//! - [`document`]: document payloads and their mapping to indexed files
//! - [`events`]: sync events and the worker that applies them

pub mod document;
pub mod events;
pub mod index;
pub mod memoized_set;
pub mod view;

pub mod prelude {
    pub use crate::document::{Document, MalformedDocument, MediaRoot};
    pub use crate::events::{
        run_worker, ApplyOutcome, DispatchError, EventDispatcher, EventReceiver, IndexUpdater,
        SyncEvent,
    };
    pub use crate::index::{File, FileRef, IndexError, SharedIndex, Tag, TagId, TagIndex};
    pub use crate::memoized_set::{ImmutableSetError, MemoizedSet, ReadonlyMemoizedSet};
    pub use crate::view::{Attributes, DirEntry, EntryKind, ViewError, VirtualFsView};
}
