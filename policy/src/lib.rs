//! Navigation policy: what an address-bar entry means, and whether a URL
//! may be loaded at all.

use log::info;

pub mod blocklist;
pub mod resolve;

pub use blocklist::{AdBlockRule, BlockList, BlockListError, RuleSource};
pub use resolve::{
    looks_like_hostname, InternalPage, NavigationTarget, ResolveError, SearchEngine,
    DEFAULT_SEARCH_URL, INTERNAL_SCHEME,
};

/// Answer to a host's pre-navigation interception hook.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PolicyDecision {
    Allow,
    Cancel,
}

/// Connection indicator shown next to the address bar.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SecurityBadge {
    Secure,
    NotSecure,
    Internal,
}

impl SecurityBadge {
    pub fn for_url(url: &str) -> Self {
        if resolve::starts_with_ignore_case(url, INTERNAL_SCHEME)
            || resolve::starts_with_ignore_case(url, "about:")
        {
            Self::Internal
        } else if resolve::starts_with_ignore_case(url, "https://") {
            Self::Secure
        } else {
            Self::NotSecure
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Secure => "Secure",
            Self::NotSecure => "Not Secure",
            Self::Internal => "AlphaSurf",
        }
    }
}

/// Address resolution plus the static block list.
#[derive(Debug, Clone)]
pub struct NavigationPolicy {
    blocklist: BlockList,
    search: SearchEngine,
}

impl NavigationPolicy {
    pub fn new(blocklist: BlockList, search: SearchEngine) -> Self {
        Self { blocklist, search }
    }

    /// Policy with no block rules and the default search engine.
    pub fn permissive() -> Self {
        Self::new(BlockList::empty(), SearchEngine::default())
    }

    /// See [`resolve::resolve`].
    pub fn resolve(&self, text: &str) -> Result<Option<NavigationTarget>, ResolveError> {
        resolve::resolve(text, &self.search)
    }

    /// Rule vetoing `url`, if any. Shell-rendered pages are never blocked.
    pub fn matching_rule(&self, url: &str) -> Option<&AdBlockRule> {
        if InternalPage::from_uri(url).is_some() {
            return None;
        }
        self.blocklist.matching_rule(url)
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        self.matching_rule(url).is_some()
    }

    /// Pre-navigation hook for navigations the engine starts on its own.
    pub fn decide(&self, candidate: &str) -> PolicyDecision {
        match self.matching_rule(candidate) {
            Some(rule) => {
                info!("blocked {candidate} (rule {rule})");
                PolicyDecision::Cancel
            }
            None => PolicyDecision::Allow,
        }
    }
}
