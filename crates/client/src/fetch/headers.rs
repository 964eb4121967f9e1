//! Response header helpers: metadata extraction and expiry.

use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName};

/// Header value as an owned string, if present and visible ASCII.
pub fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string())
}

/// Render the status line and headers as a text block.
pub fn header_block(status: StatusCode, headers: &HeaderMap) -> String {
    let mut block = format!("{}\r\n", status);
    for (name, value) in headers {
        block.push_str(name.as_str());
        block.push_str(": ");
        block.push_str(&String::from_utf8_lossy(value.as_bytes()));
        block.push_str("\r\n");
    }
    block
}

/// How long the response may be reused, from `Cache-Control` then `Expires`.
///
/// `no-cache` and `no-store` yield a zero lifetime. `must-revalidate` only
/// constrains a response once stale, so it leaves `max-age` in force.
/// `None` means the server gave no expiry information.
pub fn freshness_lifetime(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(cache_control) = header_string(headers, header::CACHE_CONTROL) {
        let mut max_age = None;
        for directive in cache_control.split(',').map(str::trim) {
            let lower = directive.to_ascii_lowercase();
            if matches!(lower.as_str(), "no-cache" | "no-store") {
                return Some(Duration::zero());
            }
            if let Some(seconds) = lower.strip_prefix("max-age=") {
                max_age = seconds.trim_matches('"').parse::<i64>().ok().map(Duration::seconds);
            }
        }
        if max_age.is_some() {
            return max_age;
        }
    }

    let expires = header_string(headers, header::EXPIRES)?;
    match DateTime::parse_from_rfc2822(&expires) {
        Ok(at) => Some((at.with_timezone(&Utc) - now).max(Duration::zero())),
        // Unparseable dates such as "0" mean already expired.
        Err(_) => Some(Duration::zero()),
    }
}

/// Declared body length, if any.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_string(headers, header::CONTENT_LENGTH)?.parse().ok()
}
