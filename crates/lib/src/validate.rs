//! # URL Validation
//!
//! Checks the caller-supplied URL before anything touches the network.

use crate::errors::FinderError;
use crate::types::{ValidatedUrl, ALLOWED_EXTENSIONS};
use std::path::Path;
use url::Url;

/// Validates a raw `url` parameter.
///
/// The checks run in a fixed order: presence, then URL shape and scheme, then
/// the declared file extension.
pub fn validate(raw_url: Option<&str>) -> Result<ValidatedUrl, FinderError> {
    let trimmed = raw_url.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(FinderError::MissingParameter);
    }

    if !is_http_uri(trimmed) {
        return Err(FinderError::InvalidUrl);
    }
    let url = Url::parse(trimmed).map_err(|_| FinderError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(FinderError::InvalidUrl);
    }

    let extension = url_extension(&url).ok_or(FinderError::UnsupportedImageType)?;
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(FinderError::UnsupportedImageType);
    }

    Ok(ValidatedUrl { url, extension })
}

/// Checks the raw text before parsing, since the URL parser repairs input such
/// as `http:example.com` or embedded spaces instead of rejecting it.
fn is_http_uri(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    let Some(rest) = lower
        .strip_prefix("http://")
        .or_else(|| lower.strip_prefix("https://"))
    else {
        return false;
    };
    !rest.is_empty() && !rest.starts_with('/') && raw.chars().all(is_uri_char)
}

fn is_uri_char(c: char) -> bool {
    c.is_ascii_graphic() && !matches!(c, '\\' | '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`')
}

/// Returns the lower-cased extension of the last path segment, if any.
pub fn url_extension(url: &Url) -> Option<String> {
    let last_segment = url.path_segments()?.next_back()?;
    Path::new(last_segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}
