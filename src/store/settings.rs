use url::Url;

use crate::storage::{ListKey, ListStore, StorageError};

/// Normalised form of a persisted or user-entered source URL.
///
/// Lists written by older clients may hold `https://host` where we would write
/// `https://host/`; both compare equal after normalisation.
pub(crate) fn normalize_source(raw: &str) -> String {
    let raw = raw.trim();
    Url::parse(raw)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Settings shared between the app and the keyboard extension.
///
/// Holds the subscribed source URLs and the in-process mirror of the
/// frequently-used emotes. Loaded once before the
/// [`RepositoryStore`](super::RepositoryStore) is built and saved by every
/// mutating call that touches it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedSettings {
    /// Subscribed repository URLs, in the order they were added
    pub sources: Vec<String>,
    /// Frequently used emote URLs, most recent first
    pub frequent_emotes: Vec<String>,
}

impl SharedSettings {
    pub async fn load<S: ListStore>(lists: &S) -> Result<Self, StorageError> {
        Ok(Self {
            sources: lists.load(&ListKey::Sources).await?,
            frequent_emotes: lists.load(&ListKey::FrequentEmotes).await?,
        })
    }

    pub async fn save<S: ListStore>(&self, lists: &S) -> Result<(), StorageError> {
        self.save_sources(lists).await?;
        self.save_frequent_emotes(lists).await
    }

    pub async fn save_sources<S: ListStore>(&self, lists: &S) -> Result<(), StorageError> {
        lists.save(&ListKey::Sources, &self.sources).await
    }

    pub async fn save_frequent_emotes<S: ListStore>(&self, lists: &S) -> Result<(), StorageError> {
        lists.save(&ListKey::FrequentEmotes, &self.frequent_emotes).await
    }

    pub fn is_subscribed(&self, source: &str) -> bool {
        let source = normalize_source(source);
        self.sources.iter().any(|s| normalize_source(s) == source)
    }
}
