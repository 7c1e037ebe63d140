//! The browser session: tabs, address bar, bookmarks, history and
//! incognito mode, driven by user input and by events from the web engine.
//!
//! Everything here runs on the UI thread. Engine callbacks reach the session
//! only through [`HostEvents`], which the shell drains between frames.

use std::rc::Rc;

use engine::{HostEvent, HostEvents, WebViewHost};
use log::{debug, info, warn};
use policy::{
    InternalPage, NavigationPolicy, NavigationTarget, PolicyDecision, ResolveError, SecurityBadge,
};
use storage::{Bookmark, BookmarkStore, HistoryEntry, Settings};
use tabs::{LoadState, Tab, TabId, TabStrip};
use thiserror::Error;
use ui::{PageContext, ScriptMessage};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidInput(#[from] ResolveError),

    #[error("navigation to {url} blocked by rule {rule}")]
    Blocked { url: String, rule: String },

    #[error("tab index {index} out of range ({len} tabs)")]
    IndexOutOfRange { index: usize, len: usize },
}

pub struct Session {
    tabs: TabStrip,
    bookmarks: Vec<Bookmark>,
    history: Vec<HistoryEntry>,
    incognito: bool,
    address_bar: String,
    settings: Settings,
    policy: Rc<NavigationPolicy>,
    host: Rc<dyn WebViewHost>,
    store: Rc<dyn BookmarkStore>,
}

impl Session {
    /// Creates an empty session with the bookmarks found in `store`.
    ///
    /// No tab exists until the first [`Session::new_tab`].
    pub fn new(
        policy: Rc<NavigationPolicy>,
        host: Rc<dyn WebViewHost>,
        store: Rc<dyn BookmarkStore>,
    ) -> Self {
        let mut bookmarks: Vec<Bookmark> = Vec::new();
        for bookmark in store.load_bookmarks() {
            match bookmarks.iter_mut().find(|b| b.url == bookmark.url) {
                Some(existing) => existing.title = bookmark.title,
                None => bookmarks.push(bookmark),
            }
        }
        debug!("session starts with {} bookmarks", bookmarks.len());

        Self {
            tabs: TabStrip::new(),
            bookmarks,
            history: Vec::new(),
            incognito: false,
            address_bar: String::new(),
            settings: Settings::default(),
            policy,
            host,
            store,
        }
    }

    /// Applies user settings. `start_incognito` switches incognito on.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.incognito = settings.start_incognito;
        self.settings = settings;
        self
    }

    // Tabs

    /// Opens a tab on the start page and makes it active.
    pub fn new_tab(&mut self) -> TabId {
        let id = self.open_slot();
        self.load_target(id, &NavigationTarget::Internal(InternalPage::Start));
        id
    }

    /// Opens a tab on whatever `text` resolves to. No tab is created when
    /// the text is blank, invalid or blocked.
    pub fn new_tab_at(&mut self, text: &str) -> Result<Option<TabId>, SessionError> {
        let Some(target) = self.policy.resolve(text)? else {
            return Ok(None);
        };
        self.check_allowed(target.url())?;

        let id = self.open_slot();
        self.load_target(id, &target);
        Ok(Some(id))
    }

    pub fn switch_tab(&mut self, index: usize) -> Result<(), SessionError> {
        let id = self.tabs.select(index).ok_or(SessionError::IndexOutOfRange {
            index,
            len: self.tabs.len(),
        })?;
        debug!("switched to tab {id} (index {index})");
        self.host.show_tab(id);
        self.refresh_address_bar();
        Ok(())
    }

    /// Closes the tab at `index`. Closing the last tab opens a fresh start
    /// page tab so the session never ends up empty.
    pub fn close_tab(&mut self, index: usize) -> Result<(), SessionError> {
        let len = self.tabs.len();
        let tab = self
            .tabs
            .close(index)
            .ok_or(SessionError::IndexOutOfRange { index, len })?;
        debug!("closed tab {}", tab.id);
        self.host.close_tab(tab.id);

        match self.tabs.active() {
            Some(active) => {
                self.host.show_tab(active.id);
                self.refresh_address_bar();
            }
            None => {
                self.new_tab();
            }
        }
        Ok(())
    }

    // Navigation

    /// Resolves address-bar text and navigates the active tab. Blank input
    /// does nothing.
    pub fn submit_address(&mut self, text: &str) -> Result<(), SessionError> {
        match self.policy.resolve(text)? {
            Some(target) => self.navigate(&target),
            None => Ok(()),
        }
    }

    /// Navigates the active tab, opening one first if the session is empty.
    ///
    /// A blocked target changes nothing and never reaches the host.
    pub fn navigate(&mut self, target: &NavigationTarget) -> Result<(), SessionError> {
        self.check_allowed(target.url())?;
        let id = match self.tabs.active() {
            Some(tab) => tab.id,
            None => self.open_slot(),
        };
        self.load_target(id, target);
        Ok(())
    }

    /// Answer for the host's pre-navigation hook.
    pub fn decide_policy(&self, url: &str) -> PolicyDecision {
        self.policy.decide(url)
    }

    /// Applies every event queued by the host. Returns how many were handled.
    pub fn drain(&mut self, events: &HostEvents) -> usize {
        let mut handled = 0;
        for event in events.pending() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::NavigationFinished { tab, url, title } => {
                self.on_navigation_finished(tab, &url, title.as_deref())
            }
            HostEvent::LoadFailed { tab, url, reason } => self.on_load_failed(tab, &url, &reason),
            HostEvent::ScriptMessage { tab, name, body } => {
                self.on_script_message(tab, &name, &body)
            }
        }
    }

    // Bookmarks

    /// Adds a bookmark, or retitles the existing one with the same url.
    pub fn add_bookmark(&mut self, url: &str, title: &str) {
        match self.bookmarks.iter_mut().find(|b| b.url == url) {
            Some(existing) if existing.title == title => return,
            Some(existing) => {
                existing.title = title.to_string();
                self.persist_bookmarks();
                self.refresh_start_pages();
            }
            None => {
                let bookmark = Bookmark::new(url, title);
                self.bookmarks.push(bookmark.clone());
                self.persist_bookmarks();
                self.append_to_start_pages(&bookmark);
            }
        }
        info!("bookmarked {url}");
    }

    pub fn remove_bookmark(&mut self, url: &str) {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.url != url);
        if self.bookmarks.len() == before {
            return;
        }
        info!("removed bookmark {url}");
        self.persist_bookmarks();
        self.refresh_start_pages();
    }

    /// Changes the url and title of the bookmark at `old_url`. Returns
    /// `false` if there is no such bookmark. Another bookmark already at
    /// `new_url` is merged into the edited one.
    pub fn edit_bookmark(&mut self, old_url: &str, new_url: &str, title: &str) -> bool {
        let Some(index) = self.bookmarks.iter().position(|b| b.url == old_url) else {
            return false;
        };
        self.bookmarks[index] = Bookmark::new(new_url, title);
        if new_url != old_url {
            let mut position = 0;
            self.bookmarks.retain(|b| {
                let keep = position == index || b.url != new_url;
                position += 1;
                keep
            });
        }
        info!("edited bookmark {old_url} -> {new_url}");
        self.persist_bookmarks();
        self.refresh_start_pages();
        true
    }

    /// Bookmarks the page shown in the active tab. Shell pages and blank
    /// tabs are skipped.
    pub fn bookmark_active_tab(&mut self) -> Option<Bookmark> {
        let tab = self.tabs.active()?;
        if tab.url.is_empty() || SecurityBadge::for_url(&tab.url) == SecurityBadge::Internal {
            return None;
        }
        let title = if tab.title.is_empty() {
            tab.url.clone()
        } else {
            tab.title.clone()
        };
        let bookmark = Bookmark::new(tab.url.clone(), title);
        self.add_bookmark(&bookmark.url, &bookmark.title);
        Some(bookmark)
    }

    // History

    /// Flips incognito mode and returns the new value.
    pub fn toggle_incognito(&mut self) -> bool {
        self.incognito = !self.incognito;
        info!("incognito {}", if self.incognito { "on" } else { "off" });
        self.incognito
    }

    pub fn clear_history(&mut self) {
        info!("cleared {} history entries", self.history.len());
        self.history.clear();
    }

    // Accessors

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.tabs.active_index()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.active()
    }

    /// Index of the tab after the active one, wrapping around.
    pub fn next_tab_index(&self) -> Option<usize> {
        self.tabs.next_index()
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.get(id)
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_incognito(&self) -> bool {
        self.incognito
    }

    /// Text the address bar should show for the active tab.
    pub fn address_bar(&self) -> &str {
        &self.address_bar
    }

    pub fn security_badge(&self) -> Option<SecurityBadge> {
        self.tabs
            .active()
            .filter(|tab| !tab.url.is_empty())
            .map(|tab| SecurityBadge::for_url(&tab.url))
    }

    fn open_slot(&mut self) -> TabId {
        let id = self.tabs.open();
        self.host.open_tab(id);
        self.host.show_tab(id);
        debug!("opened tab {id}");
        id
    }

    fn check_allowed(&self, url: &str) -> Result<(), SessionError> {
        match self.policy.matching_rule(url) {
            Some(rule) => {
                warn!("navigation to {url} blocked by rule {rule}");
                Err(SessionError::Blocked {
                    url: url.to_string(),
                    rule: rule.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    fn load_target(&mut self, id: TabId, target: &NavigationTarget) {
        let html = match target {
            NavigationTarget::Internal(page) => Some(self.render(*page)),
            _ => None,
        };
        let Some(tab) = self.tabs.get_mut(id) else {
            debug!("tab {id} went away before loading {target}");
            return;
        };
        tab.begin_load(target.url());

        match html {
            Some(html) => self.host.load_html(id, &html, target.url()),
            None => self.host.load(id, target.url()),
        }
        if self.is_active(id) {
            self.address_bar = target.url().to_string();
        }
    }

    fn render(&self, page: InternalPage) -> String {
        let context = PageContext {
            history: &self.history,
            settings: &self.settings,
            incognito: self.incognito,
        };
        ui::render(page, &context)
    }

    fn on_navigation_finished(&mut self, id: TabId, url: &str, title: Option<&str>) {
        let Some(tab) = self.tabs.get_mut(id) else {
            debug!("navigation finished in closed tab {id}");
            return;
        };
        if !tab.finish_load(url, title) {
            return;
        }
        let title = tab.title.clone();

        let internal = SecurityBadge::for_url(url) == SecurityBadge::Internal;
        if !self.incognito && !internal {
            self.history.push(HistoryEntry {
                url: url.to_string(),
                title,
            });
        }
        if self.is_active(id) {
            self.address_bar = url.to_string();
        }
        if InternalPage::from_uri(url) == Some(InternalPage::Start) {
            self.push_bookmarks(id);
        }
    }

    fn on_load_failed(&mut self, id: TabId, url: &str, reason: &str) {
        let Some(tab) = self.tabs.get_mut(id) else {
            return;
        };
        if !tab.fail_load(url, reason) {
            debug!("tab {id}: ignoring failure for {url} while {:?}", tab.state);
            return;
        }
        warn!("tab {id}: loading {url} failed: {reason}");
        self.host.load_html(id, &ui::error_page(url, reason), url);
    }

    fn on_script_message(&mut self, id: TabId, name: &str, body: &str) {
        let message = match ScriptMessage::parse(name, body) {
            Ok(message) => message,
            Err(err) => {
                warn!("tab {id}: dropping page message: {err}");
                return;
            }
        };
        if !self.accepts_message(id, &message) {
            if message == ScriptMessage::PageReady {
                debug!("tab {id}: page.ready before the shell page finished loading");
            } else {
                warn!("tab {id}: dropping {message:?} from a page outside the shell");
            }
            return;
        }
        debug!("tab {id}: {message:?}");

        let result = match message {
            ScriptMessage::PageReady => {
                self.push_bookmarks(id);
                Ok(())
            }
            ScriptMessage::OpenBookmark { url } => {
                self.navigate_tab(id, &NavigationTarget::for_url(&url))
            }
            ScriptMessage::AddBookmark { url, title } => {
                self.add_bookmark(&url, &title);
                Ok(())
            }
            ScriptMessage::RemoveBookmark { url } => {
                self.remove_bookmark(&url);
                Ok(())
            }
            ScriptMessage::Navigate { text } => match self.policy.resolve(&text) {
                Ok(Some(target)) => self.navigate_tab(id, &target),
                Ok(None) => Ok(()),
                Err(err) => Err(err.into()),
            },
            ScriptMessage::ClearHistory => {
                self.clear_history();
                self.navigate_tab(id, &NavigationTarget::Internal(InternalPage::History))
            }
        };

        if let Err(err) = result {
            info!("tab {id}: page request refused: {err}");
        }
    }

    /// Only a finished shell page may use the bridge; clearing history
    /// additionally requires the history page.
    fn accepts_message(&self, id: TabId, message: &ScriptMessage) -> bool {
        let Some(tab) = self.tabs.get(id) else {
            return false;
        };
        if tab.state != LoadState::Loaded {
            return false;
        }
        let page = InternalPage::from_uri(&tab.url);
        match message {
            ScriptMessage::ClearHistory => page == Some(InternalPage::History),
            _ => page.is_some(),
        }
    }

    fn navigate_tab(&mut self, id: TabId, target: &NavigationTarget) -> Result<(), SessionError> {
        self.check_allowed(target.url())?;
        self.load_target(id, target);
        Ok(())
    }

    fn is_active(&self, id: TabId) -> bool {
        self.tabs.active().is_some_and(|tab| tab.id == id)
    }

    fn refresh_address_bar(&mut self) {
        self.address_bar = self
            .tabs
            .active()
            .map(|tab| tab.url.clone())
            .unwrap_or_default();
    }

    fn persist_bookmarks(&self) {
        self.store.save_bookmarks(&self.bookmarks);
    }

    fn start_pages(&self) -> Vec<TabId> {
        self.tabs
            .tabs()
            .iter()
            .filter(|tab| tab.state == LoadState::Loaded)
            .filter(|tab| InternalPage::from_uri(&tab.url) == Some(InternalPage::Start))
            .map(|tab| tab.id)
            .collect()
    }

    fn push_bookmarks(&self, id: TabId) {
        match ui::load_bookmarks_script(&self.bookmarks) {
            Ok(script) => self.host.evaluate_script(id, &script),
            Err(err) => warn!("bookmarks not sent to tab {id}: {err}"),
        }
    }

    fn refresh_start_pages(&self) {
        for id in self.start_pages() {
            self.push_bookmarks(id);
        }
    }

    fn append_to_start_pages(&self, bookmark: &Bookmark) {
        let script = match ui::add_bookmark_script(bookmark) {
            Ok(script) => script,
            Err(err) => {
                warn!("bookmark not sent to start pages: {err}");
                return;
            }
        };
        for id in self.start_pages() {
            self.host.evaluate_script(id, &script);
        }
    }
}
