//! Utility functions for common operations.
//!
//! - **URL validation**: parsing user-entered repository and item URLs
//! - **Favourites keys**: the filesystem-safe encoding of a repository URL
//!
//! # Examples
//!
//! ```
//! use nitroless::util::{favourites_key, parse_source_url};
//!
//! let url = parse_source_url("https://emotes.example.com/repo", false).unwrap();
//! assert_eq!(url.host_str(), Some("emotes.example.com"));
//!
//! assert_eq!(favourites_key("https://emotes.example.com/repo"), "emotesexamplecomrepo");
//! ```

mod url_validator;

pub use url_validator::{favourites_key, parse_item_url, parse_source_url, SourceUrlError};
