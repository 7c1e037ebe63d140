//! Address-bar text to navigation target.
//!
//! The URL-vs-search split is a heuristic, not a URL grammar. Text with an
//! explicit `http(s)://` scheme is taken verbatim, hostname-shaped text gets
//! `https://` prepended, and anything else becomes a search query. Text that
//! mixes a dotted name with spaces (`example.com docs`) is always a search.

use std::fmt;

use thiserror::Error;

/// Scheme used for pages rendered by the shell itself.
pub const INTERNAL_SCHEME: &str = "alpha://";

/// Search template used when settings do not name one.
pub const DEFAULT_SEARCH_URL: &str = "https://www.google.com/search?q={query}";

const QUERY_PLACEHOLDER: &str = "{query}";

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ResolveError {
    #[error("not a valid address: {input:?}")]
    InvalidInput { input: String },
}

/// Documents served by the shell instead of the network.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InternalPage {
    Start,
    Settings,
    History,
}

impl InternalPage {
    pub fn uri(self) -> &'static str {
        match self {
            Self::Start => "alpha://start",
            Self::Settings => "alpha://settings",
            Self::History => "alpha://history",
        }
    }

    /// Parses `alpha://<page>`, ignoring case and a trailing slash.
    pub fn from_uri(uri: &str) -> Option<Self> {
        if !starts_with_ignore_case(uri, INTERNAL_SCHEME) {
            return None;
        }
        let page = uri[INTERNAL_SCHEME.len()..].trim_end_matches('/');
        match page.to_ascii_lowercase().as_str() {
            "start" | "" => Some(Self::Start),
            "settings" => Some(Self::Settings),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

impl fmt::Display for InternalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// Where a resolved address-bar entry leads.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NavigationTarget {
    /// A URL handed to the web engine as-is.
    Url(String),
    /// A search-engine query built from free text.
    Search { query: String, url: String },
    /// A shell-rendered document.
    Internal(InternalPage),
}

impl NavigationTarget {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Search { url, .. } => url,
            Self::Internal(page) => page.uri(),
        }
    }

    /// Classifies a URL that did not come from the address bar, such as a
    /// bookmark or a link followed by the engine.
    pub fn for_url(url: &str) -> Self {
        match InternalPage::from_uri(url) {
            Some(page) => Self::Internal(page),
            None => Self::Url(url.to_string()),
        }
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url())
    }
}

/// Search-engine URL template. `{query}` is replaced by the percent-encoded
/// query; templates without the placeholder get the query appended.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SearchEngine {
    template: String,
}

impl SearchEngine {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn query_url(&self, query: &str) -> String {
        let encoded = urlencoding::encode(query);
        if self.template.contains(QUERY_PLACEHOLDER) {
            self.template.replace(QUERY_PLACEHOLDER, &encoded)
        } else {
            format!("{}{encoded}", self.template)
        }
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_URL)
    }
}

/// Turns raw address-bar text into a navigation target.
///
/// Returns `Ok(None)` for blank input.
pub fn resolve(
    input: &str,
    search: &SearchEngine,
) -> Result<Option<NavigationTarget>, ResolveError> {
    let text = input.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if text.chars().any(char::is_control) {
        return Err(ResolveError::InvalidInput {
            input: text.to_string(),
        });
    }

    if starts_with_ignore_case(text, "http://") || starts_with_ignore_case(text, "https://") {
        return Ok(Some(NavigationTarget::Url(text.to_string())));
    }

    if starts_with_ignore_case(text, INTERNAL_SCHEME) {
        return InternalPage::from_uri(text)
            .map(|page| Some(NavigationTarget::Internal(page)))
            .ok_or_else(|| ResolveError::InvalidInput {
                input: text.to_string(),
            });
    }

    if text.eq_ignore_ascii_case("about:blank") {
        return Ok(Some(NavigationTarget::Url("about:blank".to_string())));
    }

    if looks_like_hostname(text) {
        return Ok(Some(NavigationTarget::Url(format!("https://{text}"))));
    }

    Ok(Some(NavigationTarget::Search {
        query: text.to_string(),
        url: search.query_url(text),
    }))
}

/// Coarse "host[:port][/path]" check.
///
/// The host must be `localhost`, a dotted IPv4 literal, or two or more DNS
/// labels whose last label is alphabetic and at least two characters long.
pub fn looks_like_hostname(text: &str) -> bool {
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        return false;
    }

    let authority_end = text.find(['/', '?', '#']).unwrap_or(text.len());
    let authority = &text[..authority_end];

    let host = match authority.rsplit_once(':') {
        Some((host, port)) => {
            if port.is_empty() || port.len() > 5 || !port.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
            host
        }
        None => authority,
    };

    if host.eq_ignore_ascii_case("localhost") || host.parse::<std::net::Ipv4Addr>().is_ok() {
        return true;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|label| is_dns_label(label)) {
        return false;
    }

    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

pub(crate) fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
