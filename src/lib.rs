//! AlphaSurf: a small browser shell.
//!
//! This crate wires the workspace together: it opens the user's profile,
//! builds the navigation policy from the saved settings and hands both to a
//! [`Session`]. The GTK front end lives in [`app`] behind the `gtk-shell`
//! feature.

use std::path::PathBuf;
use std::rc::Rc;

use engine::WebViewHost;
use log::{info, warn};
use policy::{BlockList, NavigationPolicy, SearchEngine};
use session::Session;
use storage::{BookmarkStore, JsonFileStore, MemoryStore, Settings, SettingsStore};

#[cfg(feature = "gtk-shell")]
pub mod app;

/// Where bookmarks and settings come from for one run.
pub struct Profile {
    settings: Settings,
    store: Rc<dyn BookmarkStore>,
}

impl Profile {
    /// Opens the profile stored in `dir`. A profile without a settings file
    /// gets one holding the defaults, so there is something to edit.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let store = JsonFileStore::new(dir);
        let settings = store.load_settings();
        if !store.settings_path().exists() {
            info!("writing default settings to {}", store.settings_path().display());
            store.save_settings(&settings);
        }
        info!("using profile {}", store.dir().display());
        Self {
            settings,
            store: Rc::new(store),
        }
    }

    /// Opens `$ALPHASURF_PROFILE` or the per-user default. Falls back to an
    /// in-memory profile when neither can be determined.
    pub fn open_default() -> Self {
        match JsonFileStore::default_profile_dir() {
            Some(dir) => Self::open(dir),
            None => {
                warn!("no config directory; bookmarks will not be saved");
                Self::ephemeral()
            }
        }
    }

    /// Profile that keeps everything in memory.
    pub fn ephemeral() -> Self {
        Self {
            settings: Settings::default(),
            store: Rc::new(MemoryStore::new()),
        }
    }

    /// Navigation policy for these settings.
    pub fn policy(&self) -> NavigationPolicy {
        let blocklist = load_blocklist(&self.settings);
        info!("ad-block active with {} rules", blocklist.len());
        NavigationPolicy::new(blocklist, SearchEngine::new(self.settings.search_url.clone()))
    }

    /// Session backed by this profile's bookmarks and settings.
    pub fn session(&self, policy: Rc<NavigationPolicy>, host: Rc<dyn WebViewHost>) -> Session {
        Session::new(policy, host, Rc::clone(&self.store)).with_settings(self.settings.clone())
    }
}

/// Rules named by the settings, then the built-in list, then nothing.
fn load_blocklist(settings: &Settings) -> BlockList {
    BlockList::load(&settings.adblock)
        .or_else(|err| {
            warn!("{err}; falling back to the built-in block list");
            BlockList::embedded()
        })
        .unwrap_or_else(|err| {
            warn!("built-in block list unusable, blocking disabled: {err}");
            BlockList::empty()
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use engine::RecordingHost;
    use policy::RuleSource;

    use super::*;

    #[test]
    fn missing_profile_gets_default_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile::open(dir.path().join("fresh"));

        let policy = profile.policy();
        assert!(policy.is_blocked("https://ads.doubleclick.net/x"));

        let store = JsonFileStore::new(dir.path().join("fresh"));
        assert!(store.settings_path().exists());
        assert!(!store.bookmarks_path().exists());
        assert_eq!(store.try_load_settings().unwrap(), Settings::default());
    }

    #[test]
    fn existing_settings_file_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.settings_path(), "# mine\nstart_incognito = true\n").unwrap();

        let profile = Profile::open(dir.path());
        let session = profile.session(
            Rc::new(NavigationPolicy::permissive()),
            Rc::new(RecordingHost::new()),
        );
        assert!(session.is_incognito());
        assert_eq!(
            fs::read_to_string(store.settings_path()).unwrap(),
            "# mine\nstart_incognito = true\n"
        );
    }

    #[test]
    fn settings_shape_the_policy_and_session() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.txt");
        fs::write(&rules, "# local rules\ntracker.test\n").unwrap();

        let store = JsonFileStore::new(dir.path());
        store
            .try_save_settings(&Settings {
                search_url: "https://duckduckgo.com/?q={query}".to_string(),
                start_incognito: true,
                adblock: RuleSource::File { path: rules },
            })
            .unwrap();

        let profile = Profile::open(dir.path());
        let policy = Rc::new(profile.policy());
        assert!(policy.is_blocked("https://cdn.tracker.test/pixel.gif"));
        assert!(!policy.is_blocked("https://ads.doubleclick.net/x"));
        assert_eq!(
            policy.resolve("rust lang").unwrap().unwrap().url(),
            "https://duckduckgo.com/?q=rust%20lang"
        );

        let session = profile.session(policy, Rc::new(RecordingHost::new()));
        assert!(session.is_incognito());
    }

    #[test]
    fn unreadable_rule_file_falls_back_to_embedded() {
        let settings = Settings {
            adblock: RuleSource::File {
                path: PathBuf::from("/nonexistent/alphasurf/rules.txt"),
            },
            ..Settings::default()
        };
        assert!(load_blocklist(&settings).is_blocked("https://ads.doubleclick.net/x"));
    }

    #[test]
    fn bookmarks_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Rc::new(NavigationPolicy::permissive());

        let profile = Profile::open(dir.path());
        let mut session = profile.session(Rc::clone(&policy), Rc::new(RecordingHost::new()));
        session.add_bookmark("https://www.apple.com", "Apple");
        drop(session);

        let profile = Profile::open(dir.path());
        let session = profile.session(policy, Rc::new(RecordingHost::new()));
        assert_eq!(session.bookmarks().len(), 1);
        assert_eq!(session.bookmarks()[0].title, "Apple");
    }

    #[test]
    fn ephemeral_profile_uses_defaults() {
        let profile = Profile::ephemeral();
        let session = profile.session(
            Rc::new(NavigationPolicy::permissive()),
            Rc::new(RecordingHost::new()),
        );
        assert!(!session.is_incognito());
        assert!(session.bookmarks().is_empty());
    }
}
