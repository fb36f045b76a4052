use anyhow::{Result, anyhow};
use url::{Host, Url};

/// Port the certificate check always dials, whatever the address says.
pub const TLS_PORT: u16 = 443;

/// Trimmed address as it should be registered, `None` when blank.
pub fn clean_address(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Prefix `https://` unless the address already names `http://` or `https://`.
pub fn normalize_address(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

/// Bare host used for the TLS dial.
///
/// Scheme, port, path and credentials are dropped; IPv6 hosts come back
/// without brackets.
pub fn tls_host(raw: &str) -> Result<String> {
    let url = Url::parse(&normalize_address(raw))
        .map_err(|e| anyhow!("Invalid address {raw:?}: {e}"))?;

    match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => Ok(domain.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        _ => Err(anyhow!("Address {raw:?} has no host")),
    }
}
