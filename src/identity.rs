//! Stable identity keys used to match entries across runs.

use std::fmt;

use url::Url;

use crate::entry::Entry;

/// Key under which an entry is matched against earlier runs.
///
/// URL-keyed and title-keyed identities are distinct variants, so the two
/// forms can never compare equal regardless of their text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentityKey {
    /// Canonicalized page URL.
    Url(String),
    /// Lower-cased title plus domain, used when the entry has no URL.
    Titled {
        /// Lower-cased, trimmed title.
        title: String,
        /// Lower-cased domain (possibly empty).
        domain: String,
    },
}

impl IdentityKey {
    /// Derives the key for an entry, or `None` when both url and title are empty.
    pub fn of(entry: &Entry) -> Option<Self> {
        let url = entry.url.trim();
        if !url.is_empty() {
            return Some(Self::Url(canonical_url(url)));
        }
        let title = entry.title.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self::Titled {
            title: title.to_lowercase(),
            domain: entry.domain.trim().to_lowercase(),
        })
    }

    /// True when the rendered key (including its `url:`/`title:` tag) contains `needle`.
    pub fn matches(&self, needle: &str) -> bool {
        self.to_string().contains(needle)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "url:{url}"),
            Self::Titled { title, domain } => write!(f, "title:{title}|domain:{domain}"),
        }
    }
}

/// Canonical form of a URL: scheme, lower-cased host, non-default port and
/// path without trailing slash (root excepted). Query and fragment are dropped.
///
/// Strings that do not parse as absolute URLs are only trimmed and stripped
/// of trailing slashes.
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(parsed) = Url::parse(raw) else {
        return strip_trailing_slash(raw).to_string();
    };
    let Some(host) = parsed.host_str() else {
        let mut opaque = parsed;
        opaque.set_query(None);
        opaque.set_fragment(None);
        return opaque.as_str().to_string();
    };
    let mut key = format!("{}://{}", parsed.scheme(), host.to_ascii_lowercase());
    // `port()` is None when the port is the scheme default.
    if let Some(port) = parsed.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(strip_trailing_slash(parsed.path()));
    key
}

/// Host portion of a URL, or an empty string when it cannot be parsed.
pub fn domain_of(raw: &str) -> String {
    Url::parse(raw.trim())
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_ascii_lowercase()))
        .unwrap_or_default()
}

fn strip_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}
