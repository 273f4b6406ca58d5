//! The repository store: subscriptions, manifests, recency and favourites.
//!
//! [`RepositoryStore`] is owned by a single task (the UI loop). Manifest
//! fetches run in a [`JoinSet`] owned by the store and complete as
//! [`StoreEvent`]s; the owner collects them with [`RepositoryStore::next_event`],
//! [`RepositoryStore::drain`] or [`RepositoryStore::settle`], so all in-memory
//! mutation happens on the owning task.
//!
//! ```ignore
//! let lists = FileListStore::new(data_dir);
//! let mut store = RepositoryStore::open(lists, client, StoreOptions::default()).await?;
//! store.add_source("https://nitroless.example/default").await;
//! store.settle().await;
//! for repo in store.repositories() { /* render */ }
//! ```

mod repository;
mod settings;

pub use repository::{sort_repositories, Repository, StoreEvent};
pub use settings::SharedSettings;

use settings::normalize_source;

use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

use crate::repo::{fetch_manifest, FetchOptions, Manifest, ManifestError};
use crate::storage::{move_to_front, ListKey, ListStore, StorageError};
use crate::util::{favourites_key, parse_item_url, parse_source_url};

/// Maximum entries kept in each frequently-used list.
pub const RECENCY_LIMIT: usize = 50;

/// Selects one of the two frequently-used lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyList {
    Emotes,
    Stickers,
}

impl RecencyList {
    pub fn key(self) -> ListKey {
        match self {
            RecencyList::Emotes => ListKey::FrequentEmotes,
            RecencyList::Stickers => ListKey::FrequentStickers,
        }
    }
}

/// Behaviour knobs, usually derived from [`crate::config::Config`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    pub fetch: FetchOptions,
    pub block_private_hosts: bool,
}

pub struct RepositoryStore<S: ListStore> {
    lists: S,
    client: reqwest::Client,
    options: StoreOptions,
    settings: SharedSettings,

    /// Sorted; holds only repositories whose fetch has completed
    repos: Vec<Repository>,
    selected: Option<Url>,
    frequent_stickers: Vec<String>,
    /// Aggregate favourites across all repositories
    favourites: Vec<String>,
    /// Most recently recorded emote or sticker
    last_used: Option<String>,

    /// Bumped by every reload; completions carrying an older value are dropped
    generation: u64,
    fetches: JoinSet<StoreEvent>,
    revision: watch::Sender<u64>,
}

impl<S: ListStore> RepositoryStore<S> {
    /// Load settings from `lists` and build the store.
    pub async fn open(
        lists: S,
        client: reqwest::Client,
        options: StoreOptions,
    ) -> Result<Self, StorageError> {
        let settings = SharedSettings::load(&lists).await?;
        Ok(Self::new(lists, settings, client, options).await)
    }

    /// Build the store around already-loaded settings.
    ///
    /// Reads the sticker recency list and the aggregate favourites, then starts
    /// a fetch for every subscribed source. Must be called inside a Tokio runtime.
    pub async fn new(
        lists: S,
        settings: SharedSettings,
        client: reqwest::Client,
        options: StoreOptions,
    ) -> Self {
        let (revision, _) = watch::channel(0);

        let mut store = Self {
            lists,
            client,
            options,
            settings,
            repos: Vec::new(),
            selected: None,
            frequent_stickers: Vec::new(),
            favourites: Vec::new(),
            last_used: None,
            generation: 0,
            fetches: JoinSet::new(),
            revision,
        };

        store.frequent_stickers = store.load_or_empty(&ListKey::FrequentStickers).await;
        store.favourites = store.load_or_empty(&ListKey::Favourites).await;
        store.refetch_all().await;
        store
    }

    // ========================================================================
    // Sources
    // ========================================================================

    /// Subscribe to a repository.
    ///
    /// Returns `false` if `input` is not an absolute http(s) URL, or if the
    /// updated source list could not be saved. The source is persisted before
    /// its manifest is known; the fetch completes later as a [`StoreEvent`].
    /// Adding an already-subscribed source is a no-op that returns `true`;
    /// sources that share a favourites key (`https://h/repo` and
    /// `https://h/repo/`) count as the same source.
    pub async fn add_source(&mut self, input: &str) -> bool {
        let url = match parse_source_url(input, self.options.block_private_hosts) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(input = %input, error = %e, "Rejected repository URL");
                return false;
            }
        };

        let key = favourites_key(url.as_str());
        if let Some(existing) = self
            .settings
            .sources
            .iter()
            .find(|s| favourites_key(&normalize_source(s)) == key)
        {
            tracing::debug!(source = %url, existing = %existing, "Repository already subscribed");
            return true;
        }

        let mut next = self.settings.clone();
        next.sources.push(url.to_string());
        if let Err(e) = next.save_sources(&self.lists).await {
            tracing::warn!(source = %url, error = %e, "Failed to save source list");
            return false;
        }
        self.settings = next;
        tracing::info!(source = %url, "Added repository");

        let favourites = self.load_repo_favourites(&url).await;
        self.spawn_fetch(url, favourites);
        self.notify();
        true
    }

    /// Unsubscribe from a repository and drop its favourites.
    ///
    /// The remaining sources are reloaded from scratch. Returns `false` if the
    /// source was not subscribed or the source list could not be saved.
    pub async fn remove_source(&mut self, input: &str) -> bool {
        let target = normalize_source(input);

        let mut next = self.settings.clone();
        next.sources.retain(|s| normalize_source(s) != target);
        if next.sources.len() == self.settings.sources.len() {
            tracing::debug!(source = %target, "Repository not subscribed, nothing to remove");
            return false;
        }
        if let Err(e) = next.save_sources(&self.lists).await {
            tracing::warn!(source = %target, error = %e, "Failed to save source list");
            return false;
        }
        self.settings = next;
        tracing::info!(source = %target, "Removed repository");

        self.drop_repo_favourites(&target).await;

        self.repos.retain(|r| r.source.as_str() != target);
        if self.selected.as_ref().is_some_and(|s| s.as_str() == target) {
            self.selected = None;
        }
        self.reload_all().await;
        true
    }

    /// Clear the in-memory list and refetch every subscribed source.
    ///
    /// The source list is re-read from storage first so subscriptions made by
    /// the other process are picked up. Completions arrive in any order; the
    /// list is fully sorted once [`Self::pending_fetches`] reaches zero.
    pub async fn reload_all(&mut self) {
        match self.lists.load(&ListKey::Sources).await {
            Ok(sources) => self.settings.sources = sources,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to re-read source list, using cached copy");
            }
        }
        self.refetch_all().await;
    }

    /// Start a new generation: clear the list and fetch every cached source.
    async fn refetch_all(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.repos.clear();

        let sources = self.settings.sources.clone();
        for raw in sources {
            let url = match Url::parse(&raw) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(source = %raw, error = %e, "Skipping unparseable source");
                    continue;
                }
            };
            let favourites = self.load_repo_favourites(&url).await;
            self.spawn_fetch(url, favourites);
        }

        tracing::debug!(
            generation = self.generation,
            pending = self.fetches.len(),
            "Reloading repositories"
        );
        self.notify();
    }

    /// One-off manifest fetch that does not subscribe to the source.
    pub async fn get_manifest(&self, input: &str) -> Result<Manifest, ManifestError> {
        let url = Url::parse(input.trim()).map_err(|_| ManifestError::InvalidUrl(input.to_string()))?;
        fetch_manifest(&self.client, &url, self.options.fetch).await
    }

    // ========================================================================
    // Fetch Completion
    // ========================================================================

    fn spawn_fetch(&mut self, source: Url, favourites: Vec<String>) {
        let client = self.client.clone();
        let generation = self.generation;
        let options = self.options.fetch;

        self.fetches.spawn(async move {
            let result = fetch_manifest(&client, &source, options).await;
            StoreEvent {
                generation,
                source,
                favourites,
                result,
            }
        });
    }

    /// Apply one fetch completion. Returns `true` if the repository list changed.
    ///
    /// A failed fetch still lands in the list, unresolved.
    pub fn apply(&mut self, event: StoreEvent) -> bool {
        if event.generation != self.generation {
            tracing::debug!(
                source = %event.source,
                generation = event.generation,
                current = self.generation,
                "Discarding stale manifest"
            );
            return false;
        }

        if let Err(e) = &event.result {
            tracing::warn!(source = %event.source, error = %e, "Repository manifest unavailable");
        }

        let repo = Repository::from(event);
        self.repos.retain(|r| r.source != repo.source);
        self.repos.push(repo);
        sort_repositories(&mut self.repos);
        self.notify();
        true
    }

    /// Apply a joined fetch task. A task that panicked or was cancelled is
    /// logged and leaves the list unchanged.
    fn apply_joined(&mut self, joined: Result<StoreEvent, tokio::task::JoinError>) -> bool {
        match joined {
            Ok(event) => self.apply(event),
            Err(e) => {
                tracing::warn!(error = %e, "Manifest fetch task failed");
                false
            }
        }
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn drain(&mut self) -> bool {
        let mut changed = false;
        while let Some(joined) = self.fetches.try_join_next() {
            changed |= self.apply_joined(joined);
        }
        changed
    }

    /// Wait for the next fetch to complete and apply it.
    ///
    /// Returns `Some(changed)`, or `None` straight away when nothing is
    /// pending; in a `tokio::select!` loop guard the branch with
    /// `if store.pending_fetches() > 0`.
    pub async fn next_event(&mut self) -> Option<bool> {
        let joined = self.fetches.join_next().await?;
        Some(self.apply_joined(joined))
    }

    /// Wait until every outstanding fetch has completed and been applied.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.fetches.join_next().await {
            self.apply_joined(joined);
        }
    }

    pub fn pending_fetches(&self) -> usize {
        self.fetches.len()
    }

    // ========================================================================
    // Recency Lists
    // ========================================================================

    /// Record use of an emote or sticker: move it to the front of the list,
    /// keeping at most [`RECENCY_LIMIT`] entries.
    ///
    /// The list is re-read from storage so uses recorded by the other process
    /// are kept. On any failure the in-memory list is left unchanged.
    pub async fn add_to_recency(&mut self, list: RecencyList, item: &str) {
        let url = match parse_item_url(item) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(item = %item, error = %e, "Not recording invalid item URL");
                return;
            }
        };

        let key = list.key();
        let mut items = match self.lists.load(&key).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(list = %key, error = %e, "Failed to read recency list");
                return;
            }
        };
        move_to_front(&mut items, url.as_str(), Some(RECENCY_LIMIT));

        match list {
            RecencyList::Emotes => {
                let mut next = self.settings.clone();
                next.frequent_emotes = items;
                if let Err(e) = next.save_frequent_emotes(&self.lists).await {
                    tracing::warn!(list = %key, item = %url, error = %e, "Failed to save recency list");
                    return;
                }
                self.settings = next;
            }
            RecencyList::Stickers => {
                if let Err(e) = self.lists.save(&key, &items).await {
                    tracing::warn!(list = %key, item = %url, error = %e, "Failed to save recency list");
                    return;
                }
                self.frequent_stickers = items;
            }
        }
        self.last_used = Some(url.to_string());
        self.notify();
    }

    /// Re-read both recency lists from storage.
    pub async fn reload_frequently_used(&mut self) {
        let emotes = self.lists.load(&ListKey::FrequentEmotes).await;
        let stickers = self.lists.load(&ListKey::FrequentStickers).await;
        match (emotes, stickers) {
            (Ok(emotes), Ok(stickers)) => {
                self.settings.frequent_emotes = emotes;
                self.frequent_stickers = stickers;
                self.notify();
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Failed to reload frequently used lists");
            }
        }
    }

    // ========================================================================
    // Favourites
    // ========================================================================

    /// Pin an emote in a repository's favourites and in the aggregate list,
    /// then reload repositories and the aggregate favourites.
    ///
    /// Failures are logged and abandon the operation. A failure saving the
    /// aggregate after the per-repository list was saved is not rolled back.
    pub async fn add_to_favourites(&mut self, repo_url: &str, emote_url: &str) {
        let Some((key, emote)) = self.favourite_target(repo_url, emote_url, "add") else {
            return;
        };
        let repo_key = ListKey::RepoFavourites(key);

        let mut repo_list = match self.lists.load(&repo_key).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(list = %repo_key, error = %e, "Failed to read favourites");
                return;
            }
        };
        let mut aggregate = match self.lists.load(&ListKey::Favourites).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read aggregate favourites");
                return;
            }
        };

        move_to_front(&mut repo_list, &emote, None);
        move_to_front(&mut aggregate, &emote, None);

        if let Err(e) = self.lists.save(&repo_key, &repo_list).await {
            tracing::warn!(list = %repo_key, emote = %emote, error = %e, "Failed to save favourites");
            return;
        }
        if let Err(e) = self.lists.save(&ListKey::Favourites, &aggregate).await {
            tracing::warn!(emote = %emote, error = %e, "Failed to save aggregate favourites");
            return;
        }

        tracing::info!(repo = %repo_url, emote = %emote, "Added favourite");
        self.favourites = aggregate;
        self.reload_all().await;
    }

    /// Unpin an emote from a repository's favourites and the aggregate list,
    /// and purge it from the frequently-used emotes.
    ///
    /// Each of the three lists is updated independently; a failure on one is
    /// logged and leaves that list unchanged.
    pub async fn remove_from_favourites(&mut self, repo_url: &str, emote_url: &str) {
        let Some((key, emote)) = self.favourite_target(repo_url, emote_url, "remove") else {
            return;
        };
        let repo_key = ListKey::RepoFavourites(key.clone());

        if let Some(repo_list) = self.remove_from_list(&repo_key, &emote).await {
            for repo in self.repos.iter_mut().filter(|r| r.favourites_key() == key) {
                repo.favourites = repo_list.clone();
            }
        }

        if let Some(aggregate) = self.remove_from_list(&ListKey::Favourites, &emote).await {
            self.favourites = aggregate;
        }

        if let Some(frequent) = self.remove_from_list(&ListKey::FrequentEmotes, &emote).await {
            self.settings.frequent_emotes = frequent;
        }

        tracing::info!(repo = %repo_url, emote = %emote, "Removed favourite");
        self.notify();
    }

    /// Re-read the aggregate favourites from storage.
    pub async fn reload_favourites(&mut self) {
        match self.lists.load(&ListKey::Favourites).await {
            Ok(list) => {
                self.favourites = list;
                self.notify();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to reload favourites"),
        }
    }

    /// Favourites key of `repo_url` and the normalised `emote_url`.
    fn favourite_target(&self, repo_url: &str, emote_url: &str, op: &str) -> Option<(String, String)> {
        let repo = match Url::parse(repo_url.trim()) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(op = op, repo = %repo_url, error = %e, "Invalid repository URL for favourite");
                return None;
            }
        };
        let emote = match parse_item_url(emote_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(op = op, emote = %emote_url, error = %e, "Invalid emote URL for favourite");
                return None;
            }
        };
        Some((favourites_key(repo.as_str()), emote.to_string()))
    }

    /// Load, remove `item`, save. `None` if either step failed.
    async fn remove_from_list(&self, key: &ListKey, item: &str) -> Option<Vec<String>> {
        let mut list = match self.lists.load(key).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(list = %key, error = %e, "Failed to read list");
                return None;
            }
        };
        list.retain(|existing| existing != item);
        if let Err(e) = self.lists.save(key, &list).await {
            tracing::warn!(list = %key, item = %item, error = %e, "Failed to save list");
            return None;
        }
        Some(list)
    }

    /// Delete a removed repository's favourites and purge them from the aggregate.
    ///
    /// Kept while a remaining source still maps to the same favourites key.
    async fn drop_repo_favourites(&mut self, source: &str) {
        let raw_key = favourites_key(source);
        if let Some(sharing) = self
            .settings
            .sources
            .iter()
            .find(|s| favourites_key(&normalize_source(s)) == raw_key)
        {
            tracing::debug!(source = %source, sharing = %sharing, "Favourites shared with a remaining source, keeping");
            return;
        }
        let key = ListKey::RepoFavourites(raw_key);
        let repo_list = self.load_or_empty(&key).await;

        if !repo_list.is_empty() {
            match self.lists.load(&ListKey::Favourites).await {
                Ok(mut aggregate) => {
                    aggregate.retain(|e| !repo_list.contains(e));
                    match self.lists.save(&ListKey::Favourites, &aggregate).await {
                        Ok(()) => self.favourites = aggregate,
                        Err(e) => {
                            tracing::warn!(source = %source, error = %e, "Failed to purge aggregate favourites");
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to read aggregate favourites"),
            }
        }

        if let Err(e) = self.lists.remove(&key).await {
            tracing::warn!(list = %key, error = %e, "Failed to delete repository favourites");
        }
    }

    async fn load_repo_favourites(&self, source: &Url) -> Vec<String> {
        self.load_or_empty(&ListKey::RepoFavourites(favourites_key(source.as_str())))
            .await
    }

    async fn load_or_empty(&self, key: &ListKey) -> Vec<String> {
        match self.lists.load(key).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(list = %key, error = %e, "Failed to read list, treating as empty");
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select a subscribed repository. Returns `false` if it is not subscribed.
    pub fn select_repository(&mut self, input: &str) -> bool {
        let Ok(url) = Url::parse(input.trim()) else {
            return false;
        };
        if !self.settings.is_subscribed(input) {
            return false;
        }
        self.selected = Some(url);
        self.notify();
        true
    }

    pub fn select_home(&mut self) {
        self.selected = None;
        self.notify();
    }

    /// The selected repository, once its fetch has completed.
    pub fn selected_repository(&self) -> Option<&Repository> {
        let selected = self.selected.as_ref()?;
        self.repository(selected.as_str())
    }

    // ========================================================================
    // Read Access
    // ========================================================================

    /// Sorted repositories whose fetch has completed, resolved or not.
    pub fn repositories(&self) -> &[Repository] {
        &self.repos
    }

    pub fn repository(&self, source: &str) -> Option<&Repository> {
        let source = normalize_source(source);
        self.repos.iter().find(|r| r.source.as_str() == source)
    }

    /// Persisted source URLs, in insertion order.
    pub fn sources(&self) -> &[String] {
        &self.settings.sources
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn frequent_emotes(&self) -> &[String] {
        &self.settings.frequent_emotes
    }

    pub fn frequent_stickers(&self) -> &[String] {
        &self.frequent_stickers
    }

    pub fn favourites(&self) -> &[String] {
        &self.favourites
    }

    /// The emote or sticker most recently passed to [`Self::add_to_recency`]
    /// by this process.
    pub fn last_used(&self) -> Option<&str> {
        self.last_used.as_deref()
    }

    pub fn has_repositories(&self) -> bool {
        !self.settings.sources.is_empty()
    }

    pub fn has_favourites(&self) -> bool {
        !self.favourites.is_empty()
    }

    pub fn lists(&self) -> &S {
        &self.lists
    }

    /// Revision counter bumped after every observable change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}
