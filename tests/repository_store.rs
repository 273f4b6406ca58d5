//! Integration tests for the repository store against the flat-file backend.
//!
//! Each test gets its own temporary data directory and, where manifests are
//! needed, its own mock HTTP server.

use nitroless::storage::{FileListStore, ListKey, ListStore};
use nitroless::store::{RecencyList, RepositoryStore, StoreOptions, RECENCY_LIMIT};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_store() -> (TempDir, RepositoryStore<FileListStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = RepositoryStore::open(
        FileListStore::new(dir.path()),
        reqwest::Client::new(),
        StoreOptions::default(),
    )
    .await
    .unwrap();
    (dir, store)
}

async fn mount_manifest(server: &MockServer, repo: &str, name: &str) {
    let body = format!(
        r#"{{"icon": "icon.png", "name": "{}", "path": "emotes", "emotes": [{{"name": "wave", "type": "png"}}]}}"#,
        name
    );
    Mock::given(method("GET"))
        .and(path(format!("/{}/index.json", repo)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_missing(server: &MockServer, repo: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/index.json", repo)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn emote(n: usize) -> String {
    format!("https://cdn.example/repo/emotes/{}.png", n)
}

// ============================================================================
// Sources
// ============================================================================

#[tokio::test]
async fn test_add_source_persists_immediately_regardless_of_outcome() {
    let server = MockServer::start().await;
    mount_missing(&server, "broken").await;
    let (dir, mut store) = test_store().await;
    let url = format!("{}/broken", server.uri());

    assert!(store.add_source(&url).await);

    // Written before the fetch has resolved
    let raw = std::fs::read_to_string(dir.path().join("repositories.txt")).unwrap();
    assert_eq!(raw, url);

    store.settle().await;
    assert_eq!(store.sources(), &[url]);
}

#[tokio::test]
async fn test_invalid_source_leaves_list_unchanged() {
    let server = MockServer::start().await;
    mount_manifest(&server, "valid", "Valid").await;
    let (dir, mut store) = test_store().await;
    let valid = format!("{}/valid", server.uri());
    assert!(store.add_source(&valid).await);

    for bad in ["", "   ", "repo without scheme", "://missing", "mailto:someone@example.com"] {
        assert!(!store.add_source(bad).await, "accepted {:?}", bad);
    }

    let lists = FileListStore::new(dir.path());
    assert_eq!(
        lists.load(&ListKey::Sources).await.unwrap(),
        vec![valid]
    );
    store.settle().await;
}

#[tokio::test]
async fn test_repositories_sorted_case_insensitively() {
    let server = MockServer::start().await;
    mount_manifest(&server, "b", "Banana").await;
    mount_manifest(&server, "a", "apple").await;
    let (_dir, mut store) = test_store().await;

    store.add_source(&format!("{}/b", server.uri())).await;
    store.add_source(&format!("{}/a", server.uri())).await;
    store.settle().await;

    let names: Vec<&str> = store.repositories().iter().map(|r| r.display_name()).collect();
    assert_eq!(names, vec!["apple", "Banana"]);
}

#[tokio::test]
async fn test_failed_fetch_kept_unresolved_and_removable() {
    let server = MockServer::start().await;
    mount_manifest(&server, "good", "Good").await;
    mount_missing(&server, "gone").await;
    let (_dir, mut store) = test_store().await;
    let good = format!("{}/good", server.uri());
    let gone = format!("{}/gone", server.uri());

    store.add_source(&good).await;
    store.add_source(&gone).await;
    store.settle().await;

    let broken = store.repository(&gone).unwrap();
    assert!(broken.manifest.is_none());
    assert_eq!(broken.error.as_deref(), Some("HTTP error: status 404"));

    assert!(store.remove_source(&gone).await);
    store.settle().await;

    assert_eq!(store.sources(), &[good.clone()]);
    assert_eq!(store.repositories().len(), 1);
    assert!(store.repository(&good).unwrap().is_resolved());
    assert!(store.repository(&gone).is_none());
}

/// A URL on a local port with nothing listening.
fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/repo", port)
}

#[tokio::test]
async fn test_unreachable_source_kept_unresolved_and_removable() {
    let server = MockServer::start().await;
    mount_manifest(&server, "good", "Good").await;
    let (_dir, mut store) = test_store().await;
    let good = format!("{}/good", server.uri());
    let unreachable = closed_port_url();

    assert!(store.add_source(&good).await);
    assert!(store.add_source(&unreachable).await);
    store.settle().await;

    let broken = store.repository(&unreachable).unwrap();
    assert!(broken.manifest.is_none());
    assert!(broken.error.as_deref().unwrap().starts_with("Request failed"));
    assert_eq!(store.repositories().len(), 2);

    assert!(store.remove_source(&unreachable).await);
    store.settle().await;

    assert_eq!(store.sources(), &[good.clone()]);
    assert_eq!(store.repositories().len(), 1);
    assert!(store.repository(&good).unwrap().is_resolved());
}

#[tokio::test]
async fn test_undecodable_manifest_kept_unresolved_and_removable() {
    let server = MockServer::start().await;
    mount_manifest(&server, "good", "Good").await;
    Mock::given(method("GET"))
        .and(path("/garbled/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a manifest</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/partial/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name": "No Emotes"}"#))
        .mount(&server)
        .await;
    let (_dir, mut store) = test_store().await;
    let good = format!("{}/good", server.uri());
    let garbled = format!("{}/garbled", server.uri());
    let partial = format!("{}/partial", server.uri());

    for source in [&good, &garbled, &partial] {
        assert!(store.add_source(source).await);
    }
    store.settle().await;

    for source in [&garbled, &partial] {
        let repo = store.repository(source).unwrap();
        assert!(repo.manifest.is_none());
        assert!(repo.error.as_deref().unwrap().starts_with("Invalid manifest"));
    }

    assert!(store.remove_source(&garbled).await);
    store.settle().await;

    assert_eq!(store.sources(), &[good.clone(), partial.clone()]);
    assert!(store.repository(&good).unwrap().is_resolved());
    assert!(store.repository(&partial).unwrap().manifest.is_none());
    assert!(store.repository(&garbled).is_none());
}

#[tokio::test]
async fn test_reload_restores_from_disk() {
    let server = MockServer::start().await;
    mount_manifest(&server, "repo", "Repo").await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/repo", server.uri());

    {
        let mut store = RepositoryStore::open(
            FileListStore::new(dir.path()),
            reqwest::Client::new(),
            StoreOptions::default(),
        )
        .await
        .unwrap();
        store.add_source(&url).await;
    }

    let mut store = RepositoryStore::open(
        FileListStore::new(dir.path()),
        reqwest::Client::new(),
        StoreOptions::default(),
    )
    .await
    .unwrap();
    assert!(store.has_repositories());
    store.settle().await;
    assert_eq!(store.repository(&url).unwrap().display_name(), "Repo");
}

// ============================================================================
// Recency Lists
// ============================================================================

#[tokio::test]
async fn test_duplicate_use_moves_to_front_without_growing() {
    let (_dir, mut store) = test_store().await;

    store.add_to_recency(RecencyList::Emotes, &emote(1)).await;
    store.add_to_recency(RecencyList::Emotes, &emote(2)).await;
    store.add_to_recency(RecencyList::Emotes, &emote(1)).await;
    store.add_to_recency(RecencyList::Emotes, &emote(1)).await;

    assert_eq!(store.frequent_emotes(), &[emote(1), emote(2)]);
}

#[tokio::test]
async fn test_recency_capped_at_fifty() {
    let (dir, mut store) = test_store().await;

    for n in 1..=RECENCY_LIMIT + 1 {
        store.add_to_recency(RecencyList::Stickers, &emote(n)).await;
    }

    let stickers = store.frequent_stickers();
    assert_eq!(stickers.len(), 50);
    assert_eq!(stickers[0], emote(51));
    assert!(!stickers.contains(&emote(1)));
    assert_eq!(stickers[49], emote(2));

    let on_disk = FileListStore::new(dir.path())
        .load(&ListKey::FrequentStickers)
        .await
        .unwrap();
    assert_eq!(on_disk, stickers);
}

#[tokio::test]
async fn test_recency_lists_are_independent() {
    let (_dir, mut store) = test_store().await;
    store.add_to_recency(RecencyList::Emotes, &emote(1)).await;
    store.add_to_recency(RecencyList::Stickers, &emote(2)).await;

    assert_eq!(store.frequent_emotes(), &[emote(1)]);
    assert_eq!(store.frequent_stickers(), &[emote(2)]);
}

#[tokio::test]
async fn test_reload_frequently_used_sees_extension_writes() {
    let (dir, mut store) = test_store().await;
    std::fs::write(
        dir.path().join("frequent-emotes.txt"),
        format!("{}\n{}", emote(7), emote(8)),
    )
    .unwrap();

    assert!(store.frequent_emotes().is_empty());
    store.reload_frequently_used().await;
    assert_eq!(store.frequent_emotes(), &[emote(7), emote(8)]);
}

// ============================================================================
// Favourites
// ============================================================================

#[tokio::test]
async fn test_favourite_then_unfavourite_clears_everywhere() {
    let server = MockServer::start().await;
    mount_manifest(&server, "repo", "Repo").await;
    let (dir, mut store) = test_store().await;
    let repo = format!("{}/repo", server.uri());
    let wave = format!("{}/repo/emotes/wave.png", server.uri());

    store.add_source(&repo).await;
    store.add_to_recency(RecencyList::Emotes, &wave).await;
    store.add_to_favourites(&repo, &wave).await;
    store.settle().await;

    assert_eq!(store.favourites(), &[wave.clone()]);
    assert_eq!(store.repository(&repo).unwrap().favourites, vec![wave.clone()]);
    assert!(store.has_favourites());

    store.remove_from_favourites(&repo, &wave).await;

    assert!(store.repository(&repo).unwrap().favourites.is_empty());
    assert!(store.frequent_emotes().is_empty());
    assert!(store.favourites().is_empty());

    let lists = FileListStore::new(dir.path());
    let key = store.repository(&repo).unwrap().favourites_key();
    assert!(lists.load(&ListKey::RepoFavourites(key)).await.unwrap().is_empty());
    assert!(lists.load(&ListKey::Favourites).await.unwrap().is_empty());
    assert!(lists.load(&ListKey::FrequentEmotes).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_favourites_file_uses_sanitised_key() {
    let (dir, mut store) = test_store().await;

    store
        .add_to_favourites("https://nitroless.example/default", &emote(1))
        .await;
    store
        .add_to_favourites("https://nitroless.example/default", &emote(2))
        .await;
    store
        .add_to_favourites("https://nitroless.example/default", &emote(1))
        .await;

    let raw = std::fs::read_to_string(dir.path().join("nitrolessexampledefault.nitroless")).unwrap();
    assert_eq!(raw, format!("{}\n{}", emote(1), emote(2)));
    assert_eq!(store.favourites(), &[emote(1), emote(2)]);
}

#[tokio::test]
async fn test_remove_source_drops_its_favourites() {
    let server = MockServer::start().await;
    mount_manifest(&server, "one", "One").await;
    mount_manifest(&server, "two", "Two").await;
    let (_dir, mut store) = test_store().await;
    let one = format!("{}/one", server.uri());
    let two = format!("{}/two", server.uri());
    let one_emote = format!("{}/one/emotes/wave.png", server.uri());
    let two_emote = format!("{}/two/emotes/wave.png", server.uri());

    store.add_source(&one).await;
    store.add_source(&two).await;
    store.add_to_favourites(&one, &one_emote).await;
    store.add_to_favourites(&two, &two_emote).await;
    store.settle().await;
    assert_eq!(store.favourites(), &[two_emote.clone(), one_emote.clone()]);

    assert!(store.remove_source(&one).await);
    store.settle().await;

    assert_eq!(store.favourites(), &[two_emote.clone()]);
    assert_eq!(store.repository(&two).unwrap().favourites, vec![two_emote]);

    // Re-subscribing starts with no favourites
    store.add_source(&one).await;
    store.settle().await;
    assert!(store.repository(&one).unwrap().favourites.is_empty());
}

#[tokio::test]
async fn test_invalid_favourite_urls_ignored() {
    let (dir, mut store) = test_store().await;
    store.add_to_favourites("not a repo", &emote(1)).await;
    store
        .add_to_favourites("https://nitroless.example/default", "wave.png")
        .await;

    assert!(!store.has_favourites());
    assert!(!dir.path().join("favourite-emotes.txt").exists());
}
