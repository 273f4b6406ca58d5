//! Repository bookkeeping for Nitroless emote/sticker repositories.
//!
//! A user subscribes to repositories by base URL. Each repository publishes an
//! `index.json` manifest listing its emotes and stickers. This crate keeps the
//! subscription list, fetches manifests, and maintains the "frequently used"
//! and "favourite" lists shared between the main app and its keyboard
//! extension.
//!
//! - [`store::RepositoryStore`] - the component a UI drives
//! - [`storage`] - ordered-list persistence (flat files, SQLite, in-memory)
//! - [`repo`] - manifest schema and fetching
//! - [`config`] - `config.toml` parsing

pub mod config;
pub mod repo;
pub mod storage;
pub mod store;
pub mod util;
