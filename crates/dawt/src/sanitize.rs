//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Source URLs can carry signed query strings or embedded credentials, and
//! local paths reveal user directories. Neither should end up in logs.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo, query string and fragment from a URL.
///
/// - `https://user:pw@host/v?sig=abc` → `https://host/v`
/// - `https://www.instagram.com/reel/xyz/` → unchanged
pub fn redact_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);

    if let Some(scheme_end) = without_query.find("://") {
        let scheme = &without_query[..scheme_end + 3];
        let after_scheme = &without_query[scheme_end + 3..];
        let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        let (authority, rest) = after_scheme.split_at(authority_end);
        if let Some(at_pos) = authority.rfind('@') {
            return format!("{}{}{}", scheme, &authority[at_pos + 1..], rest);
        }
    }

    without_query.to_string()
}
