//! Repository manifests: the `index.json` schema and how it is fetched.
//!
//! - `manifest` - the schema plus asset-URL derivation
//! - `fetcher` - one unauthenticated GET per repository, size-limited

mod fetcher;
mod manifest;

pub use fetcher::{build_client, fetch_manifest, manifest_url, FetchOptions, ManifestError};
pub use manifest::{join_relative, Emote, Manifest, Sticker};
