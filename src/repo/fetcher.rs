use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::manifest::{join_relative, Manifest};

/// Errors that can occur while fetching a repository manifest.
///
/// `Network`, `HttpStatus`, `Timeout` and `ResponseTooLarge` are all network
/// failures from the caller's point of view; `Decode` means the server answered
/// but the body is not a valid manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The repository URL cannot carry an `index.json` path
    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Body is not a manifest (bad JSON or a missing required field)
    #[error("Invalid manifest: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ManifestError {
    /// True for failures where the server never produced a usable response.
    pub fn is_network(&self) -> bool {
        !matches!(self, ManifestError::Decode(_) | ManifestError::InvalidUrl(_))
    }
}

/// Limits applied to every manifest fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Location of a repository's manifest: `<source>/index.json`.
pub fn manifest_url(source: &Url) -> Option<Url> {
    join_relative(source, "index.json")
}

/// Create a custom redirect policy with loop detection and limited hops.
///
/// Static hosts (GitHub Pages and friends) commonly redirect once to add a
/// trailing slash; more than 3 hops or a loop is treated as a failure.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Build the shared HTTP client used for every manifest fetch.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(create_redirect_policy())
        .build()
}

/// Fetch and decode `<source>/index.json`.
///
/// A single GET with no retries: a failed fetch stays failed until the caller
/// asks again.
///
/// # Errors
///
/// - [`ManifestError::InvalidUrl`] - `source` cannot carry a path
/// - [`ManifestError::Network`] / [`ManifestError::Timeout`] - transport failure
/// - [`ManifestError::HttpStatus`] - non-2xx response
/// - [`ManifestError::ResponseTooLarge`] - body over `options.max_bytes`
/// - [`ManifestError::Decode`] - body does not match the manifest schema
pub async fn fetch_manifest(
    client: &reqwest::Client,
    source: &Url,
    options: FetchOptions,
) -> Result<Manifest, ManifestError> {
    let index = manifest_url(source).ok_or_else(|| ManifestError::InvalidUrl(source.to_string()))?;

    let response = tokio::time::timeout(options.timeout, client.get(index.clone()).send())
        .await
        .map_err(|_| ManifestError::Timeout)??;

    if !response.status().is_success() {
        return Err(ManifestError::HttpStatus(response.status().as_u16()));
    }

    let bytes = tokio::time::timeout(options.timeout, read_limited_bytes(response, options.max_bytes))
        .await
        .map_err(|_| ManifestError::Timeout)??;

    let manifest: Manifest = serde_json::from_slice(&bytes)?;
    tracing::debug!(
        url = %index,
        name = %manifest.name,
        emotes = manifest.emotes.len(),
        "Fetched manifest"
    );
    Ok(manifest)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ManifestError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(ManifestError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ManifestError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
