use std::cell::RefCell;

use crossbeam_channel::{Receiver, Sender, TryIter};
use log::warn;
use tabs::TabId;

#[cfg(feature = "webkit")]
pub mod webkit;

#[cfg(feature = "webkit")]
pub use webkit::WebKitHost;

/// Name of the script-message handler pages use to talk to the shell.
pub const SCRIPT_HANDLER: &str = "alphasurf";

/// Capabilities the session drives on the embedded web engine.
///
/// Each tab owns one engine view ("slot"). Calls never block; outcomes come
/// back later as [`HostEvent`]s.
pub trait WebViewHost {
    /// Creates the view backing a new tab.
    fn open_tab(&self, tab: TabId);

    /// Destroys the view backing a tab.
    fn close_tab(&self, tab: TabId);

    /// Brings the tab's view to the front.
    fn show_tab(&self, tab: TabId);

    /// Starts loading a URL.
    fn load(&self, tab: TabId, url: &str);

    /// Loads a document supplied by the shell, reported back as `base_uri`.
    fn load_html(&self, tab: TabId, html: &str, base_uri: &str);

    /// Runs a script in the tab's current page.
    fn evaluate_script(&self, tab: TabId, script: &str);
}

/// Notifications raised by the engine.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum HostEvent {
    NavigationFinished {
        tab: TabId,
        url: String,
        title: Option<String>,
    },
    LoadFailed {
        tab: TabId,
        url: String,
        reason: String,
    },
    ScriptMessage {
        tab: TabId,
        name: String,
        body: String,
    },
}

/// Queue carrying engine callbacks to the thread that owns the session.
///
/// Engine signal handlers only enqueue; the session drains the queue, so
/// session state is never mutated from inside a callback.
#[derive(Debug)]
pub struct HostEvents {
    sender: Sender<HostEvent>,
    receiver: Receiver<HostEvent>,
}

impl HostEvents {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> EventSender {
        EventSender(self.sender.clone())
    }

    /// Pending events, without blocking.
    pub fn pending(&self) -> TryIter<'_, HostEvent> {
        self.receiver.try_iter()
    }
}

impl Default for HostEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle given to engine callbacks.
#[derive(Debug, Clone)]
pub struct EventSender(Sender<HostEvent>);

impl EventSender {
    pub fn send(&self, event: HostEvent) {
        if let Err(err) = self.0.send(event) {
            warn!("dropping host event, session is gone: {:?}", err.into_inner());
        }
    }
}

/// Call made on a [`RecordingHost`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum HostCommand {
    Open(TabId),
    Close(TabId),
    Show(TabId),
    Load(TabId, String),
    LoadHtml(TabId, String),
    Evaluate(TabId, String),
}

/// Headless host that records every command. Used by tests and by tools
/// that drive a session without a display.
#[derive(Debug, Default)]
pub struct RecordingHost {
    commands: RefCell<Vec<HostCommand>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.borrow().clone()
    }

    /// Returns and forgets the recorded commands.
    pub fn take(&self) -> Vec<HostCommand> {
        self.commands.take()
    }

    /// URLs passed to [`WebViewHost::load`], in order.
    pub fn loads(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|command| match command {
                HostCommand::Load(_, url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, command: HostCommand) {
        self.commands.borrow_mut().push(command);
    }
}

impl WebViewHost for RecordingHost {
    fn open_tab(&self, tab: TabId) {
        self.record(HostCommand::Open(tab));
    }

    fn close_tab(&self, tab: TabId) {
        self.record(HostCommand::Close(tab));
    }

    fn show_tab(&self, tab: TabId) {
        self.record(HostCommand::Show(tab));
    }

    fn load(&self, tab: TabId, url: &str) {
        self.record(HostCommand::Load(tab, url.to_string()));
    }

    fn load_html(&self, tab: TabId, _html: &str, base_uri: &str) {
        self.record(HostCommand::LoadHtml(tab, base_uri.to_string()));
    }

    fn evaluate_script(&self, tab: TabId, script: &str) {
        self.record(HostCommand::Evaluate(tab, script.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_delivered_in_order() {
        let events = HostEvents::new();
        let sender = events.sender();
        let tab = TabId::new(1);

        sender.send(HostEvent::NavigationFinished {
            tab,
            url: "https://a.test/".to_string(),
            title: None,
        });
        sender.clone().send(HostEvent::LoadFailed {
            tab,
            url: "https://b.test/".to_string(),
            reason: "offline".to_string(),
        });

        let drained: Vec<HostEvent> = events.pending().collect();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], HostEvent::NavigationFinished { .. }));
        assert!(matches!(drained[1], HostEvent::LoadFailed { tab: t, .. } if t == tab));
        assert_eq!(events.pending().count(), 0);
    }

    #[test]
    fn send_after_drop_is_harmless() {
        let sender = HostEvents::new().sender();
        sender.send(HostEvent::ScriptMessage {
            tab: TabId::new(1),
            name: SCRIPT_HANDLER.to_string(),
            body: "{}".to_string(),
        });
    }

    #[test]
    fn recording_host_tracks_loads() {
        let host = RecordingHost::new();
        let tab = TabId::new(7);
        host.open_tab(tab);
        host.load(tab, "https://a.test/");
        host.load_html(tab, "<p>hi</p>", "alpha://start");

        assert_eq!(host.loads(), vec!["https://a.test/".to_string()]);
        assert_eq!(host.take().len(), 3);
        assert!(host.commands().is_empty());
    }
}
