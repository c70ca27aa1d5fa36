//! Host normalization for allowlist matching.
//!
//! Hosts are compared by registrable domain (public suffix plus one label),
//! so `api.stripe.com` and `files.stripe.com` both reduce to `stripe.com`
//! while `api.stripe.com.evil.com` reduces to `evil.com`.

use url::{Host, Url};

/// Request target split into the parts the payment checker needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub host: String,
    /// eTLD+1 of `host`; `None` for bare public suffixes and single labels.
    pub registrable: Option<String>,
    pub path: String,
}

/// Registrable domain of a hostname, lowercased, trailing dot ignored.
///
/// IP literals have no public suffix and are returned as-is.
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return Some(host);
    }
    psl::domain_str(&host).map(str::to_string)
}

/// Parse an absolute URL into host, registrable domain and path.
pub fn parse_target(raw: &str) -> Option<RequestTarget> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = match url.host()? {
        Host::Domain(d) => d.to_ascii_lowercase(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };
    Some(RequestTarget {
        registrable: registrable_domain(&host),
        host,
        path: url.path().to_string(),
    })
}
