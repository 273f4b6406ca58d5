use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Local persistence failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a list file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Migration of the list database failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// List Keys
// ============================================================================

/// Identifies one persisted list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListKey {
    /// Subscribed repository URLs, in insertion order
    Sources,
    /// Frequently used emotes, most recent first, capped
    FrequentEmotes,
    /// Frequently used stickers, most recent first, capped
    FrequentStickers,
    /// Aggregate of every repository's favourites
    Favourites,
    /// One repository's favourites, keyed by [`crate::util::favourites_key`]
    RepoFavourites(String),
}

impl ListKey {
    /// File name used by [`super::FileListStore`].
    ///
    /// Global lists use `.txt`; per-repository lists use `.nitroless`, so a
    /// repository key can never collide with a global list.
    pub fn file_name(&self) -> String {
        match self {
            ListKey::Sources => "repositories.txt".to_string(),
            ListKey::FrequentEmotes => "frequent-emotes.txt".to_string(),
            ListKey::FrequentStickers => "frequent-stickers.txt".to_string(),
            ListKey::Favourites => "favourite-emotes.txt".to_string(),
            ListKey::RepoFavourites(key) => format!("{}.nitroless", key),
        }
    }

    /// Dotted key used by [`super::SqliteListStore`] and for logging.
    pub fn storage_key(&self) -> String {
        match self {
            ListKey::Sources => "sources".to_string(),
            ListKey::FrequentEmotes => "frequent.emotes".to_string(),
            ListKey::FrequentStickers => "frequent.stickers".to_string(),
            ListKey::Favourites => "favourites".to_string(),
            ListKey::RepoFavourites(key) => format!("favourites.{}", key),
        }
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_do_not_collide() {
        let repo = ListKey::RepoFavourites("frequent-emotes".to_string());
        assert_ne!(repo.file_name(), ListKey::FrequentEmotes.file_name());
        assert_eq!(repo.file_name(), "frequent-emotes.nitroless");
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(ListKey::Sources.storage_key(), "sources");
        assert_eq!(
            ListKey::RepoFavourites("examplecom".into()).to_string(),
            "favourites.examplecom"
        );
    }
}
