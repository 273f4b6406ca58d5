use std::sync::Arc;
use url::Url;

use crate::repo::{Manifest, ManifestError};
use crate::util::favourites_key;

/// A subscribed source joined with its manifest and favourites.
///
/// `manifest` is `None` while unresolved; after a failed fetch it stays `None`
/// and `error` carries the reason, so the UI can offer to remove the source.
#[derive(Debug, Clone)]
pub struct Repository {
    pub source: Url,
    pub manifest: Option<Arc<Manifest>>,
    /// Favourite emote URLs for this repository, most recent first
    pub favourites: Vec<String>,
    pub error: Option<String>,
}

/// Completion message sent by a spawned manifest fetch.
///
/// `generation` identifies the reload the fetch belongs to; completions from an
/// older reload are discarded.
#[derive(Debug)]
pub struct StoreEvent {
    pub generation: u64,
    pub source: Url,
    pub favourites: Vec<String>,
    pub result: Result<Manifest, ManifestError>,
}

impl Repository {
    pub fn is_resolved(&self) -> bool {
        self.manifest.is_some()
    }

    /// Manifest name when resolved, else the source URL.
    pub fn display_name(&self) -> &str {
        self.manifest
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or_else(|| self.source.as_str())
    }

    pub fn favourites_key(&self) -> String {
        favourites_key(self.source.as_str())
    }

    pub fn icon_url(&self) -> Option<Url> {
        self.manifest.as_ref()?.icon_url(&self.source)
    }

    pub fn emote_urls(&self) -> Vec<Url> {
        self.manifest
            .as_ref()
            .map(|m| m.emote_urls(&self.source))
            .unwrap_or_default()
    }

    pub fn sticker_urls(&self) -> Vec<Url> {
        self.manifest
            .as_ref()
            .map(|m| m.sticker_urls(&self.source))
            .unwrap_or_default()
    }
}

impl From<StoreEvent> for Repository {
    fn from(event: StoreEvent) -> Self {
        let (manifest, error) = match event.result {
            Ok(manifest) => (Some(Arc::new(manifest)), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            source: event.source,
            manifest,
            favourites: event.favourites,
            error,
        }
    }
}

/// Sort ascending, case-insensitively, by display name.
///
/// Resolved repositories compare by manifest name, unresolved ones by URL, so
/// the two interleave by whichever string is available. Equal names fall back
/// to the URL so the order is total and independent of completion order.
/// A resolved/unresolved pair deliberately compares name against URL rather
/// than URL against URL: switching keys per pair is not a total order.
pub fn sort_repositories(repos: &mut [Repository]) {
    repos.sort_by_cached_key(|r| {
        (
            r.display_name().to_lowercase(),
            r.source.as_str().to_lowercase(),
        )
    });
}
