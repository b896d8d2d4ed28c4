//! Article identifiers derived from Wikipedia URLs.

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

const WIKI_SEGMENT: &str = "/wiki/";

/// Canonical key naming an article, exactly as it appeared in the URL.
///
/// No percent-decoding happens at extraction time; use [`ArticleId::decoded`]
/// when the identifier is passed to the content API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleId(String);

impl ArticleId {
    /// Derive the identifier from an article URL.
    ///
    /// `.../wiki/<id>` wins over a `title=<id>` query parameter. Any
    /// `#fragment` or `?query` suffix is removed.
    ///
    /// ```
    /// use wikibook::ArticleId;
    ///
    /// let id = ArticleId::from_url("https://en.wikipedia.org/wiki/Foo_Bar#History").unwrap();
    /// assert_eq!(id.as_str(), "Foo_Bar");
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        let path_end = url.find(['#', '?']).unwrap_or(url.len());
        let path = &url[..path_end];

        if let Some(pos) = path.find(WIKI_SEGMENT) {
            let id = &path[pos + WIKI_SEGMENT.len()..];
            if !id.is_empty() {
                return Ok(Self(id.to_string()));
            }
        }

        if let Some(id) = title_param(url) {
            return Ok(Self(id.to_string()));
        }

        Err(Error::InvalidUrl(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier with percent-escapes resolved, as the API expects it.
    pub fn decoded(&self) -> Cow<'_, str> {
        percent_decode_str(&self.0).decode_utf8_lossy()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of the `title=` query parameter, if present and non-empty.
fn title_param(url: &str) -> Option<&str> {
    let query_start = url.find('?')?;
    let query = &url[query_start + 1..];
    let query = query.split('#').next().unwrap_or(query);

    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("title="))
        .find(|value| !value.is_empty())
}

/// Host part of an absolute or protocol-relative URL, lowercased.
pub fn wiki_host(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("//"))?;

    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    // user@host:port
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);

    if host.is_empty() || !host.contains('.') {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Language tag implied by a Wikipedia host (`de.wikipedia.org` -> `de`).
pub fn host_language(host: &str) -> Option<&str> {
    if !host.ends_with(".wikipedia.org") {
        return None;
    }
    let label = host.split('.').next()?;
    let valid = !label.is_empty()
        && label.len() <= 12
        && label != "www"
        && label != "m"
        && label.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
    valid.then_some(label)
}
