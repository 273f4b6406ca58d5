//! # Storage Layer
//!
//! Every piece of persisted state is an ordered list of strings: the
//! subscribed sources, the two recency lists, the aggregate favourites and one
//! favourites list per repository. [`ListStore`] abstracts over where those
//! lists live so [`crate::store::RepositoryStore`] runs unchanged against any
//! backend.
//!
//! ## Implementations
//!
//! - [`FileListStore`]: one newline-delimited text file per list in a shared
//!   directory. This is the format the keyboard extension reads.
//! - [`SqliteListStore`]: an embedded SQLite database (`list_entries` table).
//! - [`MemoryListStore`]: process-local, for tests.
//!
//! ## Cross-process writers
//!
//! The main app and the keyboard extension share the same data directory.
//! None of the backends lock across processes: two processes doing
//! load-modify-save on the same list can lose an update. Within one process the
//! store's `&mut self` mutators already serialise writers.

mod files;
mod lines;
mod memory;
mod sqlite;
mod types;

pub use files::FileListStore;
pub use lines::{join_lines, move_to_front, parse_lines};
pub use memory::MemoryListStore;
pub use sqlite::SqliteListStore;
pub use types::{ListKey, StorageError};

use std::future::Future;

/// Ordered-list key-value persistence.
///
/// A list that was never saved loads as empty. `save` replaces the whole list.
pub trait ListStore: Send + Sync {
    /// Load the list stored under `key`, most-recent first.
    fn load(&self, key: &ListKey) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// Replace the list stored under `key`.
    fn save(
        &self,
        key: &ListKey,
        items: &[String],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete the list stored under `key`. Deleting a missing list is not an error.
    fn remove(&self, key: &ListKey) -> impl Future<Output = Result<(), StorageError>> + Send;
}
