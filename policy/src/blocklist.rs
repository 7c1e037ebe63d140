//! Static ad-block rules compiled into one regex set.
//!
//! Domain rules are a degenerate case of pattern rules: each one compiles to
//! an anchored pattern matching the domain and its subdomains. Matching is
//! done on the full URL string, after address-bar resolution.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const EMBEDDED_RULES: &str = include_str!("../rules/default.txt");

#[derive(Debug, Error)]
pub enum BlockListError {
    #[error("invalid block pattern /{pattern}/: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("line {line}: empty block pattern")]
    EmptyPattern { line: usize },

    #[error("line {line}: invalid block domain {domain:?}")]
    InvalidDomain { line: usize, domain: String },

    #[error("failed to compile block list: {0}")]
    Compile(#[from] regex::Error),

    #[error("failed to read block rules from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the block list comes from at startup.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum RuleSource {
    /// The list compiled into the binary.
    #[default]
    Embedded,
    /// A rule file in the embedded list's format.
    File { path: PathBuf },
}

/// A single block rule.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum AdBlockRule {
    /// Blocks the domain and every subdomain, whatever the scheme or port.
    Domain(String),
    /// Case-insensitive regex matched against the full URL.
    Pattern(String),
}

impl AdBlockRule {
    /// Parses one line of rule text. Blank lines and `#` comments yield
    /// `None`.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Self>, BlockListError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        if line.len() >= 2 && line.starts_with('/') && line.ends_with('/') {
            let pattern = &line[1..line.len() - 1];
            if pattern.is_empty() {
                return Err(BlockListError::EmptyPattern { line: line_no });
            }
            return Ok(Some(Self::Pattern(pattern.to_string())));
        }

        let domain = line.trim_start_matches("*.").trim_start_matches('.');
        let valid = !domain.is_empty()
            && domain
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
        if !valid {
            return Err(BlockListError::InvalidDomain {
                line: line_no,
                domain: line.to_string(),
            });
        }
        Ok(Some(Self::Domain(domain.to_ascii_lowercase())))
    }

    fn to_regex(&self) -> String {
        match self {
            Self::Domain(domain) => format!(
                r"(?i)^[a-z][a-z0-9+.\-]*://(?:[^/?#@]*@)?(?:[^/?#@:]*\.)?{}(?::\d+)?(?:[/?#]|$)",
                regex::escape(domain)
            ),
            Self::Pattern(pattern) => format!("(?i){pattern}"),
        }
    }
}

impl fmt::Display for AdBlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => f.write_str(domain),
            Self::Pattern(pattern) => write!(f, "/{pattern}/"),
        }
    }
}

/// Immutable, compiled rule list.
#[derive(Debug, Clone)]
pub struct BlockList {
    rules: Vec<AdBlockRule>,
    set: RegexSet,
}

impl BlockList {
    pub fn new(rules: Vec<AdBlockRule>) -> Result<Self, BlockListError> {
        let patterns: Vec<String> = rules.iter().map(AdBlockRule::to_regex).collect();

        // Compile one by one first so a bad rule is reported by name.
        for (rule, pattern) in rules.iter().zip(&patterns) {
            if let Err(source) = Regex::new(pattern) {
                return Err(BlockListError::InvalidPattern {
                    pattern: rule.to_string(),
                    source,
                });
            }
        }

        let set = RegexSet::new(&patterns)?;
        Ok(Self { rules, set })
    }

    /// A list that blocks nothing.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Parses rule text: one rule per line, `#` comments, `/regex/` patterns.
    pub fn parse(text: &str) -> Result<Self, BlockListError> {
        let mut rules = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if let Some(rule) = AdBlockRule::parse_line(line, index + 1)? {
                rules.push(rule);
            }
        }
        Self::new(rules)
    }

    pub fn embedded() -> Result<Self, BlockListError> {
        Self::parse(EMBEDDED_RULES)
    }

    pub fn from_file(path: &Path) -> Result<Self, BlockListError> {
        let text = fs::read_to_string(path).map_err(|source| BlockListError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn load(source: &RuleSource) -> Result<Self, BlockListError> {
        let list = match source {
            RuleSource::Embedded => Self::embedded()?,
            RuleSource::File { path } => Self::from_file(path)?,
        };
        debug!("loaded {} block rules from {source:?}", list.len());
        Ok(list)
    }

    /// First rule (in list order) matching `url`.
    pub fn matching_rule(&self, url: &str) -> Option<&AdBlockRule> {
        let index = self.set.matches(url).into_iter().next()?;
        self.rules.get(index)
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        self.set.is_match(url)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_rules_compile() {
        let list = BlockList::embedded().unwrap();
        assert!(!list.is_empty());
    }

    #[test]
    fn embedded_rules_block_known_ad_hosts() {
        let list = BlockList::embedded().unwrap();
        for url in [
            "https://ads.doubleclick.net/x",
            "http://doubleclick.net",
            "HTTPS://PAGEAD2.GOOGLESYNDICATION.COM/pagead/show_ads.js",
            "https://adservice.google.com/ddm/fls",
            "https://sb.scorecardresearch.com:443/beacon.js",
            "https://www.google-analytics.com/analytics.js",
        ] {
            assert!(list.is_blocked(url), "{url} should be blocked");
        }
    }

    #[test]
    fn embedded_rules_allow_ordinary_sites() {
        let list = BlockList::embedded().unwrap();
        for url in [
            "https://openai.com",
            "https://www.google.com/search?q=doubleclick.net",
            "https://notdoubleclick.net/",
            "https://doubleclick.net.example.org/",
            "https://adobe.com/",
            "https://example.com/ads/banner.png",
        ] {
            assert!(!list.is_blocked(url), "{url} should be allowed");
        }
    }

    #[test]
    fn domain_rule_covers_subdomains_only() {
        let list = BlockList::parse("tracker.example\n").unwrap();
        assert!(list.is_blocked("https://tracker.example/"));
        assert!(list.is_blocked("https://a.b.tracker.example/pixel?x=1"));
        assert!(list.is_blocked("wss://tracker.example:8443"));
        assert!(list.is_blocked("https://user@tracker.example/"));
        assert!(!list.is_blocked("https://mytracker.example/"));
        assert!(!list.is_blocked("https://tracker.example.org/"));
    }

    #[test]
    fn matching_rule_reports_first_match() {
        let list = BlockList::parse("# comment\n\n/^https://evil\\./\nevil.test\n").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.matching_rule("https://evil.test/"),
            Some(&AdBlockRule::Pattern("^https://evil\\.".to_string()))
        );
        assert_eq!(
            list.matching_rule("http://evil.test/"),
            Some(&AdBlockRule::Domain("evil.test".to_string()))
        );
        assert_eq!(list.matching_rule("https://good.test/"), None);
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(matches!(
            BlockList::parse("/^https://(unclosed/"),
            Err(BlockListError::InvalidPattern { .. })
        ));
        assert!(matches!(
            BlockList::parse("ok.test\n//\n"),
            Err(BlockListError::EmptyPattern { line: 2 })
        ));
        assert!(matches!(
            BlockList::parse("not a domain"),
            Err(BlockListError::InvalidDomain { line: 1, .. })
        ));
    }

    #[test]
    fn empty_list_blocks_nothing() {
        let list = BlockList::empty();
        assert!(!list.is_blocked("https://ads.doubleclick.net/x"));
        assert_eq!(list.matching_rule("https://ads.doubleclick.net/x"), None);
    }

    #[test]
    fn loads_rules_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "*.blocked.test").unwrap();
        let list = BlockList::load(&RuleSource::File {
            path: file.path().to_path_buf(),
        })
        .unwrap();
        assert!(list.is_blocked("https://cdn.blocked.test/a.js"));

        let missing = BlockList::load(&RuleSource::File {
            path: PathBuf::from("/nonexistent/alphasurf/rules.txt"),
        });
        assert!(matches!(missing, Err(BlockListError::Io { .. })));
    }
}
