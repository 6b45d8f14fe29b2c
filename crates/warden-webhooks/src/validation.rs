//! Checks on subscription input: endpoint URLs and names.
//!
//! Endpoints must be HTTPS (plain HTTP only when explicitly allowed for local
//! development) and must not point into private or internal networks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

use crate::error::WebhookError;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_URL_LEN: usize = 2048;

/// Validate a delivery endpoint.
pub fn validate_webhook_url(raw: &str, allow_http: bool) -> Result<(), WebhookError> {
    if raw.len() > MAX_URL_LEN {
        return Err(WebhookError::InvalidUrl(format!(
            "URL longer than {MAX_URL_LEN} characters"
        )));
    }

    let parsed =
        Url::parse(raw).map_err(|e| WebhookError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(WebhookError::InvalidUrl(
                "Webhook URLs must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(WebhookError::InvalidUrl(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(WebhookError::InvalidUrl(
            "Credentials in webhook URLs are not allowed".to_string(),
        ));
    }

    match parsed.host() {
        None => Err(WebhookError::InvalidUrl("URL must have a host".to_string())),
        Some(Host::Ipv4(ip)) => reject_internal_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => reject_internal_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => reject_internal_hostname(domain),
    }
}

/// Validate a subscription display name.
pub fn validate_name(name: &str) -> Result<(), WebhookError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(WebhookError::Validation("name must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(WebhookError::Validation(format!(
            "name longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn reject_internal_ip(ip: IpAddr) -> Result<(), WebhookError> {
    if is_internal_ip(&ip) {
        return Err(WebhookError::SsrfDetected(format!(
            "Destination {ip} is a private or internal address"
        )));
    }
    Ok(())
}

fn reject_internal_hostname(host: &str) -> Result<(), WebhookError> {
    let lower = host.trim_end_matches('.').to_ascii_lowercase();
    if lower == "localhost"
        || lower.ends_with(".localhost")
        || lower.ends_with(".internal")
        || lower.ends_with(".local")
    {
        return Err(WebhookError::SsrfDetected(format!(
            "Destination host {host} is a restricted internal hostname"
        )));
    }
    Ok(())
}

fn is_internal_v4(v4: &Ipv4Addr) -> bool {
    let [a, b, ..] = v4.octets();
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local() // cloud metadata lives in 169.254.0.0/16
        || v4.is_broadcast()
        || v4.is_unspecified()
        || (a == 100 && (b & 0xC0) == 64) // 100.64.0.0/10
}

fn is_internal_v6(v6: &Ipv6Addr) -> bool {
    if let Some(v4) = v6.to_ipv4_mapped() {
        return is_internal_v4(&v4);
    }
    let first = v6.segments()[0];
    v6.is_loopback()
        || v6.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // fc00::/7
        || (first & 0xffc0) == 0xfe80 // fe80::/10
}

fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => is_internal_v6(v6),
    }
}
