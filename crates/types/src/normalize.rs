//! Bit-exact normalization rules. These are pure functions: the alert
//! engine calls them before deriving an `Entity`, and the graph and
//! bundler never re-derive normalization — they only ever see already
//! normalized values.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Dotted quad, no leading zeros. Returns `None` if `s` is not a valid
/// dotted-quad IPv4 literal (leading zeros are treated as invalid rather
/// than silently stripped, since `089` is ambiguous between octal and
/// decimal readers).
pub fn normalize_ipv4(s: &str) -> Option<String> {
    for octet in s.split('.') {
        if octet.len() > 1 && octet.starts_with('0') {
            return None;
        }
    }
    let addr: Ipv4Addr = s.parse().ok()?;
    Some(addr.to_string())
}

/// RFC 5952 compressed form, lowercase. `std::net::Ipv6Addr::to_string`
/// already implements RFC 5952 compression.
pub fn normalize_ipv6(s: &str) -> Option<String> {
    let addr: Ipv6Addr = s.parse().ok()?;
    Some(addr.to_string().to_lowercase())
}

/// IDNA-to-ASCII (punycode), lowercase, trailing dot removed.
pub fn normalize_domain(s: &str) -> String {
    let trimmed = s.trim().trim_end_matches('.');
    idna::domain_to_ascii(trimmed).unwrap_or_else(|_| trimmed.to_lowercase())
}

/// Scheme lowercase, host normalized per `normalize_domain`, default port
/// removed, path percent-decoded then re-encoded, fragment dropped.
pub fn normalize_url(s: &str) -> Option<String> {
    let mut url = url::Url::parse(s).ok()?;
    url.set_fragment(None);
    if let Some(host) = url.host_str() {
        let normalized_host = normalize_domain(host);
        url.set_host(Some(&normalized_host)).ok()?;
    }
    let default_port = match url.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        "ftp" => Some(21),
        _ => None,
    };
    if url.port() == default_port {
        let _ = url.set_port(None);
    }
    Some(url.to_string())
}

/// Lowercase hex, type tag prefix (`md5:`, `sha1:`, `sha256:`) included in
/// the returned value.
pub fn normalize_file_hash(tag: &str, hex_digest: &str) -> String {
    format!("{}:{}", tag, hex_digest.to_lowercase())
}

/// Normalized executable name + lowercased base command line.
pub fn normalize_process(executable: &str, command_line: &str) -> String {
    format!("{}|{}", executable, command_line.to_lowercase())
}

/// `domain\user` for Windows, `user@realm` for UNIX with a realm,
/// otherwise just `user`.
pub fn normalize_user(user: &str, domain_or_realm: Option<&str>, windows_style: bool) -> String {
    match (domain_or_realm, windows_style) {
        (Some(d), true) => format!("{}\\{}", d, user),
        (Some(realm), false) => format!("{}@{}", user, realm),
        (None, _) => user.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_rejects_leading_zeros() {
        assert_eq!(normalize_ipv4("10.0.0.1"), Some("10.0.0.1".to_string()));
        assert_eq!(normalize_ipv4("10.0.0.01"), None);
    }

    #[test]
    fn ipv6_compresses() {
        assert_eq!(
            normalize_ipv6("2001:0db8:0000:0000:0000:0000:0000:0001"),
            Some("2001:db8::1".to_string())
        );
    }

    #[test]
    fn domain_strips_trailing_dot_and_lowercases() {
        assert_eq!(normalize_domain("Example.COM."), "example.com");
    }

    #[test]
    fn file_hash_prefixes_tag() {
        assert_eq!(normalize_file_hash("sha256", "ABCD"), "sha256:abcd");
    }
}
