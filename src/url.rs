//! URL validation helpers
//!
//! The coordinator drops malformed submissions before they reach storage;
//! the same check guards callback registration.

use crate::UrlError;
use url::Url;

/// Validates that a string is a well-formed absolute http(s) URL.
pub fn validate_url(raw: &str) -> Result<Url, UrlError> {
    let parsed = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UrlError::InvalidScheme(parsed.scheme().to_string()));
    }

    if parsed.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(parsed)
}

/// Lower-cased host of a URL string, if it parses and has one.
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()?
        .host_str()
        .map(|host| host.to_lowercase())
}
