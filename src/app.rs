use adw::prelude::*;
use gtk::glib;
use log::info;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use engine::{HostEvents, WebKitHost};
use policy::{InternalPage, NavigationTarget};
use session::{Session, SessionError};

use crate::Profile;

const APP_ID: &str = "org.alphasurf.Browser";
const APP_TITLE: &str = "AlphaSurf";
const EVENT_POLL_MS: u64 = 30;

/// Widgets the shell refreshes from session state.
struct Shell {
    session: RefCell<Session>,
    events: HostEvents,
    address: gtk::Entry,
    badge: gtk::Label,
    tab_label: gtk::Label,
    incognito: gtk::ToggleButton,
    toasts: adw::ToastOverlay,
    shown_address: RefCell<String>,
}

impl Shell {
    /// Re-renders the chrome. The address entry is only overwritten when the
    /// session's text changed, so typing is not clobbered by page events.
    fn refresh(&self) {
        let session = self.session.borrow();

        let address = session.address_bar();
        if *self.shown_address.borrow() != address {
            let shown = if address == InternalPage::Start.uri() {
                ""
            } else {
                address
            };
            self.address.set_text(shown);
            *self.shown_address.borrow_mut() = address.to_string();
        }

        let badge = session.security_badge().map(|badge| badge.label()).unwrap_or("");
        self.badge.set_text(badge);

        let position = session.active_index().map(|index| index + 1).unwrap_or(0);
        self.tab_label
            .set_text(&format!("{position}/{}", session.tab_count()));

        if self.incognito.is_active() != session.is_incognito() {
            self.incognito.set_active(session.is_incognito());
        }
    }

    fn report(&self, result: Result<(), SessionError>) {
        if let Err(err) = result {
            info!("{err}");
            self.toasts.add_toast(adw::Toast::new(&err.to_string()));
        }
        self.refresh();
    }

    fn poll(&self) {
        let handled = self.session.borrow_mut().drain(&self.events);
        if handled > 0 {
            self.refresh();
        }
    }
}

pub fn run() -> glib::ExitCode {
    let app = adw::Application::builder().application_id(APP_ID).build();
    app.connect_activate(build_ui);
    app.run()
}

fn build_ui(app: &adw::Application) {
    let style_manager = adw::StyleManager::default();
    style_manager.set_color_scheme(adw::ColorScheme::Default);

    let profile = Profile::open_default();
    let policy = Rc::new(profile.policy());

    let stack = gtk::Stack::new();
    stack.set_hexpand(true);
    stack.set_vexpand(true);

    let events = HostEvents::new();
    let host = Rc::new(WebKitHost::new(stack.clone(), events.sender(), Rc::clone(&policy)));
    let session = profile.session(policy, host);

    let toasts = adw::ToastOverlay::new();
    toasts.set_child(Some(&stack));

    let address = gtk::Entry::new();
    address.set_hexpand(true);
    address.set_placeholder_text(Some("Search or enter address"));

    let badge = gtk::Label::new(None);
    badge.add_css_class("dim-label");
    let tab_label = gtk::Label::new(None);

    let new_tab_button = icon_button("tab-new-symbolic", "New Tab");
    let next_tab_button = icon_button("go-next-symbolic", "Next Tab");
    let close_tab_button = icon_button("window-close-symbolic", "Close Tab");
    let home_button = icon_button("go-home-symbolic", "Start Page");
    let history_button = icon_button("document-open-recent-symbolic", "History");
    let settings_button = icon_button("emblem-system-symbolic", "Settings");
    let bookmark_button = icon_button("starred-symbolic", "Bookmark This Page");
    let incognito = gtk::ToggleButton::builder()
        .icon_name("security-high-symbolic")
        .tooltip_text("Incognito")
        .build();

    let address_box = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    address_box.set_hexpand(true);
    address_box.append(&badge);
    address_box.append(&address);

    let header = adw::HeaderBar::new();
    header.set_show_start_title_buttons(true);
    header.set_show_end_title_buttons(true);
    header.pack_start(&new_tab_button);
    header.pack_start(&next_tab_button);
    header.pack_start(&close_tab_button);
    header.pack_start(&tab_label);
    header.pack_start(&home_button);
    header.set_title_widget(Some(&address_box));
    header.pack_end(&settings_button);
    header.pack_end(&history_button);
    header.pack_end(&incognito);
    header.pack_end(&bookmark_button);

    let root = gtk::Box::new(gtk::Orientation::Vertical, 0);
    root.append(&header);
    root.append(&toasts);

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title(APP_TITLE)
        .default_width(1280)
        .default_height(800)
        .content(&root)
        .build();

    let shell = Rc::new(Shell {
        session: RefCell::new(session),
        events,
        address: address.clone(),
        badge,
        tab_label,
        incognito: incognito.clone(),
        toasts,
        shown_address: RefCell::new(String::new()),
    });

    window.present();

    shell.session.borrow_mut().new_tab();
    shell.refresh();

    let shell_for_poll = Rc::clone(&shell);
    glib::timeout_add_local(Duration::from_millis(EVENT_POLL_MS), move || {
        shell_for_poll.poll();
        glib::ControlFlow::Continue
    });

    let shell_for_address = Rc::clone(&shell);
    address.connect_activate(move |entry| {
        let text = entry.text();
        let result = shell_for_address.session.borrow_mut().submit_address(&text);
        shell_for_address.report(result);
    });

    let shell_for_new = Rc::clone(&shell);
    new_tab_button.connect_clicked(move |_| {
        shell_for_new.session.borrow_mut().new_tab();
        shell_for_new.refresh();
    });

    let shell_for_next = Rc::clone(&shell);
    next_tab_button.connect_clicked(move |_| {
        let result = {
            let mut session = shell_for_next.session.borrow_mut();
            match session.next_tab_index() {
                Some(index) => session.switch_tab(index),
                None => Ok(()),
            }
        };
        shell_for_next.report(result);
    });

    let shell_for_close = Rc::clone(&shell);
    close_tab_button.connect_clicked(move |_| {
        let result = {
            let mut session = shell_for_close.session.borrow_mut();
            match session.active_index() {
                Some(index) => session.close_tab(index),
                None => Ok(()),
            }
        };
        shell_for_close.report(result);
    });

    for (button, page) in [
        (&home_button, InternalPage::Start),
        (&history_button, InternalPage::History),
        (&settings_button, InternalPage::Settings),
    ] {
        let shell_for_page = Rc::clone(&shell);
        button.connect_clicked(move |_| {
            let result = shell_for_page
                .session
                .borrow_mut()
                .navigate(&NavigationTarget::Internal(page));
            shell_for_page.report(result);
        });
    }

    let shell_for_bookmark = Rc::clone(&shell);
    bookmark_button.connect_clicked(move |_| {
        let added = shell_for_bookmark.session.borrow_mut().bookmark_active_tab();
        let text = match added {
            Some(bookmark) => format!("Bookmarked {}", bookmark.title),
            None => "This page cannot be bookmarked".to_string(),
        };
        shell_for_bookmark.toasts.add_toast(adw::Toast::new(&text));
    });

    let shell_for_incognito = Rc::clone(&shell);
    incognito.connect_toggled(move |button| {
        let wanted = button.is_active();
        let Ok(mut session) = shell_for_incognito.session.try_borrow_mut() else {
            return;
        };
        if session.is_incognito() != wanted {
            session.toggle_incognito();
        }
    });
}

fn icon_button(icon: &str, tooltip: &str) -> gtk::Button {
    let button = gtk::Button::from_icon_name(icon);
    button.set_tooltip_text(Some(tooltip));
    button
}
