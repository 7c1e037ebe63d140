use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use gtk::prelude::*;
use log::{debug, warn};
use policy::{NavigationPolicy, PolicyDecision};
use tabs::TabId;
use webkit6::prelude::*;

use crate::{EventSender, HostEvent, WebViewHost, SCRIPT_HANDLER};

/// WebKitGTK-backed host: one `webkit6::WebView` per tab, stacked in a
/// `gtk::Stack` so only the active tab is visible.
pub struct WebKitHost {
    stack: gtk::Stack,
    views: RefCell<HashMap<TabId, webkit6::WebView>>,
    events: EventSender,
    policy: Rc<NavigationPolicy>,
}

impl WebKitHost {
    pub fn new(stack: gtk::Stack, events: EventSender, policy: Rc<NavigationPolicy>) -> Self {
        Self {
            stack,
            views: RefCell::new(HashMap::new()),
            events,
            policy,
        }
    }

    fn settings() -> webkit6::Settings {
        webkit6::Settings::builder()
            .enable_javascript(true)
            .build()
    }

    fn with_view<F: FnOnce(&webkit6::WebView)>(&self, tab: TabId, f: F) {
        match self.views.borrow().get(&tab) {
            Some(view) => f(view),
            None => debug!("no view for tab {tab}"),
        }
    }

    fn create_view(&self, tab: TabId) -> webkit6::WebView {
        let manager = webkit6::UserContentManager::new();
        if !manager.register_script_message_handler(SCRIPT_HANDLER, None) {
            warn!("failed to register script message handler for tab {tab}");
        }

        let settings = Self::settings();
        let view = webkit6::WebView::builder()
            .settings(&settings)
            .user_content_manager(&manager)
            .build();
        view.set_hexpand(true);
        view.set_vexpand(true);

        // WebKit reports FINISHED after a failed or cancelled load too; that
        // one is not a completed navigation.
        let failed = Rc::new(Cell::new(false));

        let events = self.events.clone();
        let failed_for_changes = Rc::clone(&failed);
        view.connect_load_changed(move |view, event| {
            match event {
                webkit6::LoadEvent::Started => failed_for_changes.set(false),
                webkit6::LoadEvent::Finished if !failed_for_changes.get() => {
                    let Some(url) = view.uri().map(|uri| uri.to_string()) else {
                        return;
                    };
                    events.send(HostEvent::NavigationFinished {
                        tab,
                        url,
                        title: view.title().map(|title| title.to_string()),
                    });
                }
                _ => {}
            }
        });

        let events = self.events.clone();
        view.connect_load_failed(move |_, _event, uri, error| {
            failed.set(true);
            if error.matches(webkit6::NetworkError::Cancelled) {
                debug!("tab {tab}: load of {uri} cancelled");
                return false;
            }
            events.send(HostEvent::LoadFailed {
                tab,
                url: uri.to_string(),
                reason: error.to_string(),
            });
            // The session shows its own error page.
            true
        });

        let policy = Rc::clone(&self.policy);
        view.connect_decide_policy(move |_, decision, decision_type| {
            if decision_type != webkit6::PolicyDecisionType::NavigationAction {
                return false;
            }
            let Some(navigation) = decision.dynamic_cast_ref::<webkit6::NavigationPolicyDecision>()
            else {
                return false;
            };
            let Some(mut action) = navigation.navigation_action() else {
                return false;
            };
            let Some(uri) = action.request().and_then(|request| request.uri()) else {
                return false;
            };

            match policy.decide(&uri) {
                PolicyDecision::Allow => false,
                PolicyDecision::Cancel => {
                    decision.ignore();
                    true
                }
            }
        });

        let events = self.events.clone();
        manager.connect_script_message_received(Some(SCRIPT_HANDLER), move |_, value| {
            events.send(HostEvent::ScriptMessage {
                tab,
                name: SCRIPT_HANDLER.to_string(),
                body: value.to_str().to_string(),
            });
        });

        view
    }
}

impl WebViewHost for WebKitHost {
    fn open_tab(&self, tab: TabId) {
        let view = self.create_view(tab);
        let name = tab.to_string();
        self.stack.add_named(&view, Some(&name));
        self.views.borrow_mut().insert(tab, view);
    }

    fn close_tab(&self, tab: TabId) {
        if let Some(view) = self.views.borrow_mut().remove(&tab) {
            view.stop_loading();
            self.stack.remove(&view);
        }
    }

    fn show_tab(&self, tab: TabId) {
        self.with_view(tab, |view| self.stack.set_visible_child(view));
    }

    fn load(&self, tab: TabId, url: &str) {
        self.with_view(tab, |view| view.load_uri(url));
    }

    fn load_html(&self, tab: TabId, html: &str, base_uri: &str) {
        self.with_view(tab, |view| view.load_html(html, Some(base_uri)));
    }

    fn evaluate_script(&self, tab: TabId, script: &str) {
        self.with_view(tab, |view| {
            view.evaluate_javascript(script, None, None, None::<&gtk::gio::Cancellable>, |_| {});
        });
    }
}
