//! SSRF guard (§6): rejects private/loopback/link-local/multicast target
//! hosts unless development mode explicitly allows them.

use std::net::IpAddr;

use url::Url;

use crate::error::{PublishError, Result};

/// Checks a dispatch unit's configured URL before it is ever handed to the
/// HTTP client. Resolution is by literal IP/hostname only — DNS rebinding
/// after this check is out of scope, matching the Receiver schema's own
/// description of the guard as IP-range based.
pub fn check(raw_url: &str, allow_private: bool) -> Result<()> {
    let url = Url::parse(raw_url).map_err(|e| PublishError::InvalidUrl(format!("{raw_url}: {e}")))?;

    if allow_private {
        return Ok(());
    }

    match url.scheme() {
        "https" => {}
        "http" => {}
        other => return Err(PublishError::InvalidUrl(format!("unsupported scheme {other:?}"))),
    }

    let host = url.host_str().ok_or_else(|| PublishError::InvalidUrl("missing host".to_string()))?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_disallowed(ip) {
            return Err(PublishError::SsrfRejected(format!("{host} resolves to a disallowed range")));
        }
    } else if host.eq_ignore_ascii_case("localhost") {
        return Err(PublishError::SsrfRejected("localhost".to_string()));
    }

    Ok(())
}

fn is_disallowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // link-local fe80::/10
        }
    }
}
