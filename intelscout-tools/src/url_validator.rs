//! SSRF-safe URL acceptance
//!
//! Every URL handed to the scraper must pass this predicate: http(s) only,
//! bounded length, and no host that lands in loopback, link-local, private,
//! or cloud-metadata address space.

use intelscout_core::{IntelScoutError, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Maximum accepted URL length.
pub const MAX_URL_LENGTH: usize = 2048;

/// Hostnames rejected outright regardless of resolution.
const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "metadata.google.internal"];

/// Validate a raw URL against the SSRF predicate, returning the parsed URL.
pub fn validate_url(raw: &str) -> Result<Url> {
    if raw.len() > MAX_URL_LENGTH {
        return Err(unsafe_url(format!(
            "URL exceeds {MAX_URL_LENGTH} characters"
        )));
    }

    let parsed = Url::parse(raw)
        .map_err(|e| unsafe_url(format!("unparseable URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(unsafe_url(format!("scheme '{other}' is not allowed")));
        }
    }

    match parsed.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            if BLOCKED_HOSTNAMES.contains(&domain.as_str())
                || domain.ends_with(".localhost")
            {
                return Err(unsafe_url(format!("host '{domain}' is blocked")));
            }
            // Dotted-quad hosts sometimes parse as domains; re-check.
            if let Ok(ip) = domain.parse::<IpAddr>() {
                check_ip(ip)?;
            }
        }
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
        None => return Err(unsafe_url("URL has no host".to_string())),
    }

    Ok(parsed)
}

fn check_ip(ip: IpAddr) -> Result<()> {
    let blocked = match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    };
    if blocked {
        Err(unsafe_url(format!("address {ip} is in a blocked range")))
    } else {
        Ok(())
    }
}

/// 127.0.0.0/8, 0.0.0.0, 169.254.0.0/16, 10.0.0.0/8, 172.16.0.0/12,
/// 192.168.0.0/16.
fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified() || ip.is_link_local() || ip.is_private()
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    // Mapped IPv4 falls back to the v4 rules
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_v4(v4);
    }
    let segments = ip.segments();
    // fe80::/10 link-local, fc00::/7 unique-local
    (segments[0] & 0xffc0) == 0xfe80 || (segments[0] & 0xfe00) == 0xfc00
}

fn unsafe_url(message: String) -> IntelScoutError {
    IntelScoutError::UnsafeUrl { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(raw: &str) -> bool {
        matches!(validate_url(raw), Err(IntelScoutError::UnsafeUrl { .. }))
    }

    #[test]
    fn test_accepts_public_urls() {
        assert!(validate_url("https://example.com/page").is_ok());
        assert!(validate_url("http://news.example.org/a?b=c").is_ok());
        assert!(validate_url("https://8.8.8.8/status").is_ok());
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(rejected("file:///etc/passwd"));
        assert!(rejected("ftp://example.com/file"));
        assert!(rejected("gopher://example.com"));
    }

    #[test]
    fn test_rejects_loopback_and_unspecified() {
        assert!(rejected("http://127.0.0.1/admin"));
        assert!(rejected("http://127.8.9.10/"));
        assert!(rejected("http://0.0.0.0/"));
        assert!(rejected("http://[::1]/"));
    }

    #[test]
    fn test_rejects_private_and_link_local() {
        assert!(rejected("http://10.1.2.3/"));
        assert!(rejected("http://172.16.0.9/"));
        assert!(rejected("http://172.31.255.1/"));
        assert!(rejected("http://192.168.1.1/router"));
        assert!(rejected("http://169.254.169.254/latest/meta-data/"));
    }

    #[test]
    fn test_accepts_adjacent_public_ranges() {
        // Just outside 172.16.0.0/12
        assert!(validate_url("http://172.15.0.1/").is_ok());
        assert!(validate_url("http://172.32.0.1/").is_ok());
    }

    #[test]
    fn test_rejects_blocked_hostnames() {
        assert!(rejected("http://localhost/"));
        assert!(rejected("http://LOCALHOST:8080/"));
        assert!(rejected("http://metadata.google.internal/computeMetadata/v1/"));
        assert!(rejected("http://internal.localhost/"));
    }

    #[test]
    fn test_rejects_overlong_url() {
        let raw = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(rejected(&raw));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(rejected("not a url"));
        assert!(rejected("https://"));
    }

    #[test]
    fn test_rejects_ipv6_local_ranges() {
        assert!(rejected("http://[fe80::1]/"));
        assert!(rejected("http://[fd00::2]/"));
        assert!(rejected("http://[::ffff:192.168.0.1]/"));
    }
}
