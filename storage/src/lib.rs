use std::cell::{Cell, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use policy::{RuleSource, DEFAULT_SEARCH_URL};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides the profile directory when set.
pub const PROFILE_ENV: &str = "ALPHASURF_PROFILE";

const BOOKMARKS_FILE: &str = "bookmarks.json";
const SETTINGS_FILE: &str = "settings.toml";

/// A saved page, unique by `url`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

impl Bookmark {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// One completed, non-incognito navigation.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
}

/// User-editable preferences, stored as TOML.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Search template; `{query}` is replaced by the encoded query.
    pub search_url: String,
    /// Open the first window with history recording switched off.
    pub start_incognito: bool,
    pub adblock: RuleSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            start_incognito: false,
            adblock: RuleSource::Embedded,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed bookmark file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed settings file {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode bookmarks: {0}")]
    EncodeJson(#[from] serde_json::Error),

    #[error("failed to encode settings: {0}")]
    EncodeToml(#[from] toml::ser::Error),
}

/// Durable bookmark storage.
///
/// Implementations never fail towards the caller: unreadable data loads as
/// an empty list and failed writes are logged.
pub trait BookmarkStore {
    /// Loads all bookmarks in stored order.
    fn load_bookmarks(&self) -> Vec<Bookmark>;

    /// Replaces the stored bookmarks with `bookmarks`.
    fn save_bookmarks(&self, bookmarks: &[Bookmark]);
}

/// Durable settings storage. Same failure contract as [`BookmarkStore`].
pub trait SettingsStore {
    fn load_settings(&self) -> Settings;

    fn save_settings(&self, settings: &Settings);
}

/// Profile directory holding `bookmarks.json` and `settings.toml`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$ALPHASURF_PROFILE`, or `<config dir>/alphasurf`.
    pub fn default_profile_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(PROFILE_ENV) {
            return Some(PathBuf::from(dir));
        }
        dirs::config_dir().map(|dir| dir.join("alphasurf"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bookmarks_path(&self) -> PathBuf {
        self.dir.join(BOOKMARKS_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Reads the bookmark file. A missing file is an empty list.
    pub fn try_load_bookmarks(&self) -> Result<Vec<Bookmark>, PersistenceError> {
        let path = self.bookmarks_path();
        let Some(contents) = read_optional(&path)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&contents).map_err(|source| PersistenceError::Json { path, source })
    }

    pub fn try_save_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(bookmarks)?;
        write_atomic(&self.bookmarks_path(), &json)
    }

    /// Reads the settings file. A missing file yields the defaults.
    pub fn try_load_settings(&self) -> Result<Settings, PersistenceError> {
        let path = self.settings_path();
        let Some(contents) = read_optional(&path)? else {
            return Ok(Settings::default());
        };
        toml::from_str(&contents).map_err(|source| PersistenceError::Toml { path, source })
    }

    pub fn try_save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        let text = toml::to_string_pretty(settings)?;
        write_atomic(&self.settings_path(), &text)
    }
}

impl BookmarkStore for JsonFileStore {
    fn load_bookmarks(&self) -> Vec<Bookmark> {
        match self.try_load_bookmarks() {
            Ok(bookmarks) => {
                debug!("loaded {} bookmarks from {}", bookmarks.len(), self.dir.display());
                bookmarks
            }
            Err(err) => {
                warn!("starting with no bookmarks: {err}");
                Vec::new()
            }
        }
    }

    fn save_bookmarks(&self, bookmarks: &[Bookmark]) {
        if let Err(err) = self.try_save_bookmarks(bookmarks) {
            warn!("bookmarks not saved: {err}");
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn load_settings(&self) -> Settings {
        self.try_load_settings().unwrap_or_else(|err| {
            warn!("using default settings: {err}");
            Settings::default()
        })
    }

    fn save_settings(&self, settings: &Settings) {
        if let Err(err) = self.try_save_settings(settings) {
            warn!("settings not saved: {err}");
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, PersistenceError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whole-file replace: write a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents).map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

/// In-process store for tests and throwaway profiles.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bookmarks: RefCell<Vec<Bookmark>>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bookmarks(bookmarks: Vec<Bookmark>) -> Self {
        Self {
            bookmarks: RefCell::new(bookmarks),
            ..Self::default()
        }
    }

    /// Number of bookmark saves performed so far.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn stored_bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.borrow().clone()
    }
}

impl BookmarkStore for MemoryStore {
    fn load_bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.borrow().clone()
    }

    fn save_bookmarks(&self, bookmarks: &[Bookmark]) {
        *self.bookmarks.borrow_mut() = bookmarks.to_vec();
        self.saves.set(self.saves.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Bookmark> {
        vec![
            Bookmark::new("https://www.apple.com", "Apple"),
            Bookmark::new("https://www.google.com", "Google"),
        ]
    }

    #[test]
    fn missing_profile_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("profile"));
        assert!(store.load_bookmarks().is_empty());
        assert_eq!(store.load_settings(), Settings::default());
    }

    #[test]
    fn corrupt_bookmarks_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.bookmarks_path(), "{ not json").unwrap();

        assert!(matches!(
            store.try_load_bookmarks(),
            Err(PersistenceError::Json { .. })
        ));
        assert!(store.load_bookmarks().is_empty());
    }

    #[test]
    fn save_then_load_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        store.try_save_bookmarks(&sample()).unwrap();
        let first = fs::read(store.bookmarks_path()).unwrap();

        let loaded = store.load_bookmarks();
        assert_eq!(loaded, sample());
        store.save_bookmarks(&loaded);
        let second = fs::read(store.bookmarks_path()).unwrap();

        assert_eq!(first, second);
        assert!(!dir.path().join("nested/bookmarks.json.tmp").exists());
    }

    #[test]
    fn missing_title_defaults_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.bookmarks_path(), r#"[{"url":"https://a.test"}]"#).unwrap();
        assert_eq!(store.load_bookmarks(), vec![Bookmark::new("https://a.test", "")]);
    }

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let settings = Settings {
            search_url: "https://duckduckgo.com/?q={query}".to_string(),
            start_incognito: true,
            adblock: RuleSource::File {
                path: PathBuf::from("/etc/alphasurf/rules.txt"),
            },
        };
        store.try_save_settings(&settings).unwrap();
        assert_eq!(store.try_load_settings().unwrap(), settings);
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.settings_path(), "start_incognito = true\n").unwrap();

        let settings = store.load_settings();
        assert!(settings.start_incognito);
        assert_eq!(settings.search_url, DEFAULT_SEARCH_URL);
        assert_eq!(settings.adblock, RuleSource::Embedded);
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.settings_path(), "start_incognito = \"maybe\"\n").unwrap();
        assert_eq!(store.load_settings(), Settings::default());
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::with_bookmarks(sample());
        assert_eq!(store.load_bookmarks().len(), 2);
        store.save_bookmarks(&[]);
        assert_eq!(store.save_count(), 1);
        assert!(store.stored_bookmarks().is_empty());
    }
}
