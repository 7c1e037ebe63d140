use std::fmt;

use log::debug;
use util::IdGenerator;

/// Stable identifier for a browser tab.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TabId(u64);

impl TabId {
    /// Creates a new `TabId` from a raw numeric value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Load lifecycle of a single tab.
///
/// `Idle -> Loading -> Loaded | Failed`. A new navigation moves any state
/// back to `Loading`.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed { reason: String },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// One navigable browsing context.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Tab {
    pub id: TabId,
    /// Current URL, empty until the first navigation.
    pub url: String,
    pub title: String,
    pub state: LoadState,
}

impl Tab {
    fn new(id: TabId) -> Self {
        Self {
            id,
            url: String::new(),
            title: String::new(),
            state: LoadState::Idle,
        }
    }

    /// Points the tab at `url` and marks it as loading.
    pub fn begin_load(&mut self, url: &str) {
        debug!("tab {}: {:?} -> Loading ({url})", self.id, self.state);
        self.url = url.to_string();
        self.state = LoadState::Loading;
    }

    /// Records a completed navigation reported by the host. Returns `false`
    /// when the completion only closes out the failed load of the same URL,
    /// in which case the tab stays `Failed`.
    ///
    /// Otherwise accepted from any state: the host also finishes navigations
    /// the page started on its own, and the last completion wins.
    pub fn finish_load(&mut self, url: &str, title: Option<&str>) -> bool {
        if matches!(self.state, LoadState::Failed { .. }) && self.url == url {
            debug!("tab {}: completion of failed load {url} ignored", self.id);
            return false;
        }
        debug!("tab {}: {:?} -> Loaded ({url})", self.id, self.state);
        self.url = url.to_string();
        if let Some(title) = title {
            self.title = title.to_string();
        }
        self.state = LoadState::Loaded;
        true
    }

    /// Marks an in-flight load of `url` as failed. Returns `false` when the
    /// tab was not loading, in which case nothing changes.
    pub fn fail_load(&mut self, url: &str, reason: &str) -> bool {
        if !self.state.is_loading() {
            return false;
        }
        debug!("tab {}: Loading -> Failed ({url}: {reason})", self.id);
        self.url = url.to_string();
        self.state = LoadState::Failed {
            reason: reason.to_string(),
        };
        true
    }
}

/// Ordered tab collection with a single active index.
///
/// Starts empty; once a tab has been opened the active index always points
/// at an existing tab until the last tab is closed.
#[derive(Debug, Default)]
pub struct TabStrip {
    tabs: Vec<Tab>,
    active: Option<usize>,
    ids: IdGenerator,
}

impl TabStrip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fresh idle tab and makes it active.
    pub fn open(&mut self) -> TabId {
        let id = TabId::new(self.ids.next_id());
        self.tabs.push(Tab::new(id));
        self.active = Some(self.tabs.len() - 1);
        id
    }

    /// Makes the tab at `index` active. Returns its id, or `None` when the
    /// index is out of range.
    pub fn select(&mut self, index: usize) -> Option<TabId> {
        let id = self.tabs.get(index)?.id;
        self.active = Some(index);
        Some(id)
    }

    /// Removes the tab at `index`, keeping the active index on the same tab
    /// or on its nearest neighbour.
    pub fn close(&mut self, index: usize) -> Option<Tab> {
        if index >= self.tabs.len() {
            return None;
        }
        let removed = self.tabs.remove(index);

        self.active = match self.active {
            _ if self.tabs.is_empty() => None,
            Some(active) if index < active => Some(active - 1),
            Some(active) => Some(active.min(self.tabs.len() - 1)),
            None => Some(0),
        };

        Some(removed)
    }

    /// Cycles to the tab after the active one.
    pub fn next_index(&self) -> Option<usize> {
        let active = self.active?;
        Some((active + 1) % self.tabs.len())
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&Tab> {
        self.active.and_then(|index| self.tabs.get(index))
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_makes_new_tab_active() {
        let mut strip = TabStrip::new();
        assert!(strip.is_empty());
        assert_eq!(strip.active_index(), None);

        let first = strip.open();
        let second = strip.open();
        assert_ne!(first, second);
        assert_eq!(strip.len(), 2);
        assert_eq!(strip.active_index(), Some(1));
        assert_eq!(strip.active().map(|tab| tab.id), Some(second));
    }

    #[test]
    fn select_rejects_out_of_range() {
        let mut strip = TabStrip::new();
        strip.open();
        strip.open();
        assert_eq!(strip.select(2), None);
        assert_eq!(strip.active_index(), Some(1));
        assert!(strip.select(0).is_some());
        assert_eq!(strip.active_index(), Some(0));
    }

    #[test]
    fn close_keeps_active_on_neighbour() {
        let mut strip = TabStrip::new();
        let a = strip.open();
        let b = strip.open();
        let c = strip.open();

        strip.select(1);
        strip.close(0);
        assert_eq!(strip.active().map(|tab| tab.id), Some(b));

        strip.close(0);
        assert_eq!(strip.active().map(|tab| tab.id), Some(c));

        strip.close(0);
        assert!(strip.is_empty());
        assert_eq!(strip.active_index(), None);
        assert!(strip.get(a).is_none());
    }

    #[test]
    fn closing_last_active_tab_moves_left() {
        let mut strip = TabStrip::new();
        let a = strip.open();
        strip.open();
        strip.close(1);
        assert_eq!(strip.active().map(|tab| tab.id), Some(a));
    }

    #[test]
    fn next_index_wraps() {
        let mut strip = TabStrip::new();
        assert_eq!(strip.next_index(), None);
        strip.open();
        strip.open();
        assert_eq!(strip.next_index(), Some(0));
    }

    #[test]
    fn load_transitions() {
        let mut strip = TabStrip::new();
        let id = strip.open();
        let tab = strip.get_mut(id).unwrap();
        assert_eq!(tab.state, LoadState::Idle);
        assert!(!tab.fail_load("https://example.com", "offline"));

        tab.begin_load("https://example.com");
        assert!(tab.state.is_loading());
        assert!(tab.fail_load("https://example.com/", "offline"));
        assert_eq!(
            tab.state,
            LoadState::Failed {
                reason: "offline".to_string()
            }
        );

        assert!(!tab.finish_load("https://example.com/", None));
        assert!(matches!(tab.state, LoadState::Failed { .. }));

        tab.begin_load("https://example.com");
        assert!(tab.finish_load("https://example.com/", Some("Example")));
        assert_eq!(tab.state, LoadState::Loaded);
        assert_eq!(tab.url, "https://example.com/");
        assert_eq!(tab.title, "Example");
    }
}
