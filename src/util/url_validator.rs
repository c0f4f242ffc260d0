use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors produced when a candidate feed URL is not acceptable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    /// Nothing was entered.
    #[error("URL must not be empty")]
    Empty,
    /// The string is not an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Which hosts a feed URL may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostPolicy {
    /// Reject localhost and private address ranges.
    #[default]
    PublicOnly,
    /// Accept any host. Used for local feeds and test servers.
    AllowPrivate,
}

/// Checks that `url_str` is a well-formed absolute http(s) URL.
///
/// Surrounding whitespace is trimmed before parsing. With
/// [`HostPolicy::PublicOnly`], loopback and private addresses are rejected:
/// - `localhost`, `127.0.0.0/8`, `::1`
/// - RFC 1918, link-local, unspecified, unique local IPv6
///
/// # Examples
///
/// ```
/// use feedwatch::util::{validate_url, HostPolicy};
///
/// let url = validate_url("https://example.com/feed.xml", HostPolicy::PublicOnly).unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("not a url", HostPolicy::PublicOnly).is_err());
/// assert!(validate_url("http://192.168.1.1/feed", HostPolicy::PublicOnly).is_err());
/// assert!(validate_url("http://192.168.1.1/feed", HostPolicy::AllowPrivate).is_ok());
/// ```
pub fn validate_url(url_str: &str, policy: HostPolicy) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = Url::parse(trimmed)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    if policy == HostPolicy::AllowPrivate {
        return Ok(url);
    }

    if host == "localhost" {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
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

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC: HostPolicy = HostPolicy::PublicOnly;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com/feed.xml", PUBLIC).is_ok());
        assert!(validate_url("http://news.example.org", PUBLIC).is_ok());
    }

    #[test]
    fn test_empty_and_blank_rejected() {
        assert_eq!(validate_url("", PUBLIC), Err(UrlValidationError::Empty));
        assert_eq!(validate_url("   ", PUBLIC), Err(UrlValidationError::Empty));
    }

    #[test]
    fn test_not_a_url_rejected() {
        let err = validate_url("not a url", PUBLIC).unwrap_err();
        assert!(matches!(err, UrlValidationError::InvalidUrl(_)));
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(validate_url("/feed.xml", PUBLIC).is_err());
        assert!(validate_url("example.com/feed.xml", PUBLIC).is_err());
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let url = validate_url("  https://example.com/rss  ", PUBLIC).unwrap();
        assert_eq!(url.as_str(), "https://example.com/rss");
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(validate_url("file:///etc/passwd", PUBLIC).is_err());
        assert!(matches!(
            validate_url("ftp://example.com", PUBLIC),
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }

    #[test]
    fn test_localhost_rejected() {
        assert!(validate_url("http://localhost/feed", PUBLIC).is_err());
        assert!(validate_url("http://127.0.0.1/feed", PUBLIC).is_err());
        assert!(validate_url("http://[::1]/feed", PUBLIC).is_err());
    }

    #[test]
    fn test_private_ips_rejected() {
        assert!(validate_url("http://192.168.1.1/feed", PUBLIC).is_err());
        assert!(validate_url("http://10.0.0.1:3000/feed", PUBLIC).is_err());
        assert!(validate_url("http://172.16.0.1/feed", PUBLIC).is_err());
        assert!(validate_url("http://169.254.1.1/feed", PUBLIC).is_err());
        assert!(validate_url("http://[fe80::1]/feed", PUBLIC).is_err());
        assert!(validate_url("http://0.0.0.0/feed", PUBLIC).is_err());
    }

    #[test]
    fn test_allow_private_accepts_local_hosts() {
        let policy = HostPolicy::AllowPrivate;
        assert!(validate_url("http://127.0.0.1:8080/feed", policy).is_ok());
        assert!(validate_url("http://localhost/feed", policy).is_ok());
        // Scheme rules still apply
        assert!(validate_url("file:///etc/passwd", policy).is_err());
    }
}
