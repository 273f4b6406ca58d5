use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur when validating a repository source URL.
#[derive(Error, Debug)]
pub enum SourceUrlError {
    /// The string is not an absolute URL.
    #[error("Invalid URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a user-entered repository URL.
///
/// The input must parse as an absolute `http` or `https` URL. When
/// `block_private_hosts` is set, localhost and private/link-local addresses are
/// rejected as well; self-hosted repositories on a LAN are common, so this is
/// opt-in.
///
/// # Examples
///
/// ```
/// use nitroless::util::parse_source_url;
///
/// assert!(parse_source_url("https://example.com/repo", false).is_ok());
/// assert!(parse_source_url("not a url", false).is_err());
/// assert!(parse_source_url("ftp://example.com", false).is_err());
/// assert!(parse_source_url("http://192.168.1.1/repo", true).is_err());
/// ```
pub fn parse_source_url(input: &str, block_private_hosts: bool) -> Result<Url, SourceUrlError> {
    let url = Url::parse(input.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(SourceUrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if !block_private_hosts {
        return Ok(url);
    }

    if let Some(host) = url.host_str() {
        if host == "localhost" {
            return Err(SourceUrlError::Localhost);
        }

        // Strip brackets from IPv6 addresses for parsing
        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(SourceUrlError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(SourceUrlError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

/// Parses an emote or sticker URL into its normalised absolute form.
pub fn parse_item_url(input: &str) -> Result<Url, url::ParseError> {
    Url::parse(input.trim())
}

/// Derives the filesystem-safe key under which a repository's favourites are
/// stored: the `https://` or `http://` prefix is stripped, then every `.` and
/// `/` is removed.
///
/// The key is shared with the keyboard extension, so it must stay stable.
pub fn favourites_key(repo_url: &str) -> String {
    let rest = repo_url
        .strip_prefix("https://")
        .or_else(|| repo_url.strip_prefix("http://"))
        .unwrap_or(repo_url);

    rest.chars().filter(|c| *c != '.' && *c != '/').collect()
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
