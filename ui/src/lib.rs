//! Bridge between the shell and the pages it renders.
//!
//! Pages post JSON messages (`{"type": ..., "payload": ...}`) on the
//! [`SCRIPT_HANDLER`] channel; the shell answers by evaluating scripts that
//! call functions the start page defines.

use engine::SCRIPT_HANDLER;
use policy::{InternalPage, INTERNAL_SCHEME};
use serde::{Deserialize, Serialize};
use storage::Bookmark;
use thiserror::Error;

pub mod pages;

pub use pages::{error_page, render, PageContext};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("message on unknown handler {name:?}")]
    UnknownHandler { name: String },

    #[error("malformed bridge message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("refusing to open {url:?} from a page message")]
    InvalidUrl { url: String },
}

/// Messages a page may send to the shell.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ScriptMessage {
    #[serde(rename = "page.ready")]
    PageReady,
    #[serde(rename = "bookmark.open")]
    OpenBookmark { url: String },
    #[serde(rename = "bookmark.add")]
    AddBookmark {
        url: String,
        #[serde(default)]
        title: String,
    },
    #[serde(rename = "bookmark.remove")]
    RemoveBookmark { url: String },
    #[serde(rename = "nav.go")]
    Navigate { text: String },
    #[serde(rename = "history.clear")]
    ClearHistory,
}

impl ScriptMessage {
    /// Decodes and validates a raw message from handler `name`.
    pub fn parse(name: &str, body: &str) -> Result<Self, BridgeError> {
        if name != SCRIPT_HANDLER {
            return Err(BridgeError::UnknownHandler {
                name: name.to_string(),
            });
        }
        let message: Self = serde_json::from_str(body)?;
        message.validate()
    }

    fn validate(self) -> Result<Self, BridgeError> {
        let url = match &self {
            Self::OpenBookmark { url }
            | Self::AddBookmark { url, .. }
            | Self::RemoveBookmark { url } => url,
            _ => return Ok(self),
        };

        // Removal accepts whatever URL was stored.
        if matches!(self, Self::RemoveBookmark { .. }) && !url.trim().is_empty() {
            return Ok(self);
        }

        if is_openable(url) {
            Ok(self)
        } else {
            Err(BridgeError::InvalidUrl { url: url.clone() })
        }
    }
}

/// Web and shell URLs only; no `javascript:`, `file:` or `data:`.
fn is_openable(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    let web = ["http://", "https://"]
        .iter()
        .any(|scheme| lower.len() > scheme.len() && lower.starts_with(scheme));
    web || (lower.starts_with(INTERNAL_SCHEME) && InternalPage::from_uri(&lower).is_some())
}

/// Script replacing the start page's bookmark list.
pub fn load_bookmarks_script(bookmarks: &[Bookmark]) -> Result<String, BridgeError> {
    let json = serde_json::to_string(bookmarks)?;
    Ok(format!("loadBookmarks({json});"))
}

/// Script appending one bookmark to the start page's list.
pub fn add_bookmark_script(bookmark: &Bookmark) -> Result<String, BridgeError> {
    let url = serde_json::to_string(&bookmark.url)?;
    let title = serde_json::to_string(&bookmark.title)?;
    Ok(format!("addBookmark({url}, {title});"))
}
