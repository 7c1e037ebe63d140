use policy::InternalPage;
use storage::{HistoryEntry, Settings};

const START_PAGE: &str = include_str!("../assets/start.html");

/// Session data shown on shell-rendered pages.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub history: &'a [HistoryEntry],
    pub settings: &'a Settings,
    pub incognito: bool,
}

/// Produces the HTML document for an internal page.
///
/// The start page fills its bookmark list itself once the shell calls
/// `loadBookmarks`.
pub fn render(page: InternalPage, context: &PageContext<'_>) -> String {
    match page {
        InternalPage::Start => START_PAGE.to_string(),
        InternalPage::History => history_page(context),
        InternalPage::Settings => settings_page(context),
    }
}

fn history_page(context: &PageContext<'_>) -> String {
    let mut rows = String::new();
    for entry in context.history.iter().rev() {
        let label = if entry.title.is_empty() {
            &entry.url
        } else {
            &entry.title
        };
        rows.push_str(&format!(
            "<li><a href=\"{}\">{}</a><small>{}</small></li>\n",
            escape(&entry.url),
            escape(label),
            escape(&entry.url),
        ));
    }

    let body = if rows.is_empty() {
        "<p class=\"empty\">No history yet.</p>".to_string()
    } else {
        format!("<ol>\n{rows}</ol>\n<button id=\"clear\">Clear history</button>")
    };
    let note = if context.incognito {
        "<p class=\"note\">Incognito is on: new visits are not recorded.</p>"
    } else {
        ""
    };

    shell_page(
        "History",
        &format!("{note}{body}"),
        "document.getElementById('clear')?.addEventListener('click', () => post('history.clear'));",
    )
}

fn settings_page(context: &PageContext<'_>) -> String {
    let settings = context.settings;
    let adblock = match &settings.adblock {
        policy::RuleSource::Embedded => "built-in list".to_string(),
        policy::RuleSource::File { path } => path.display().to_string(),
    };
    let body = format!(
        "<dl>\n\
         <dt>Search engine</dt><dd>{}</dd>\n\
         <dt>Ad-block rules</dt><dd>{}</dd>\n\
         <dt>Start in incognito</dt><dd>{}</dd>\n\
         <dt>Incognito now</dt><dd>{}</dd>\n\
         </dl>\n\
         <p class=\"note\">Edit settings.toml in your profile directory to change these.</p>",
        escape(&settings.search_url),
        escape(&adblock),
        yes_no(settings.start_incognito),
        yes_no(context.incognito),
    );
    shell_page("Settings", &body, "")
}

/// Document shown in place of a page that failed to load. It has no links:
/// a retry has to go through the address bar.
pub fn error_page(url: &str, reason: &str) -> String {
    let body = format!(
        "<p>AlphaSurf could not open <strong>{}</strong>.</p>\n\
         <p class=\"note\">{}</p>\n\
         <p class=\"note\">Press Enter in the address bar to try again.</p>",
        escape(url),
        escape(reason),
    );
    shell_page("Page not available", &body, "")
}

fn shell_page(title: &str, body: &str, script: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 760px; margin: 40px auto; }}
li {{ margin: 6px 0; }}
li small {{ display: block; color: #777; }}
dt {{ font-weight: 600; margin-top: 12px; }}
.note, .empty {{ color: #777; }}
</style>
</head>
<body>
<h1>{title}</h1>
{body}
<script>
function post(type, payload) {{
  const handler = window.webkit && window.webkit.messageHandlers
    && window.webkit.messageHandlers.alphasurf;
  if (handler) {{
    handler.postMessage(JSON.stringify({{ type, payload: payload === undefined ? null : payload }}));
  }}
}}
{script}
</script>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, title: &str) -> HistoryEntry {
        HistoryEntry {
            url: url.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn start_page_defines_bridge_functions() {
        let settings = Settings::default();
        let context = PageContext {
            history: &[],
            settings: &settings,
            incognito: false,
        };
        let html = render(InternalPage::Start, &context);
        assert!(html.contains("function loadBookmarks("));
        assert!(html.contains("function addBookmark("));
        assert!(html.contains("messageHandlers.alphasurf"));
    }

    #[test]
    fn history_page_lists_newest_first_and_escapes() {
        let settings = Settings::default();
        let history = [
            entry("https://a.test/", "First"),
            entry("https://b.test/?q=<x>", ""),
        ];
        let context = PageContext {
            history: &history,
            settings: &settings,
            incognito: true,
        };
        let html = render(InternalPage::History, &context);

        let b = html.find("https://b.test/?q=&lt;x&gt;").unwrap();
        let a = html.find("First").unwrap();
        assert!(b < a);
        assert!(!html.contains("<x>"));
        assert!(html.contains("Incognito is on"));
    }

    #[test]
    fn empty_history_page() {
        let settings = Settings::default();
        let context = PageContext {
            history: &[],
            settings: &settings,
            incognito: false,
        };
        assert!(render(InternalPage::History, &context).contains("No history yet."));
    }

    #[test]
    fn error_page_escapes_url_and_reason() {
        let html = error_page("https://down.test/?a=<b>", "Could not connect: \"refused\"");
        assert!(html.contains("<title>Page not available</title>"));
        assert!(html.contains("https://down.test/?a=&lt;b&gt;"));
        assert!(html.contains("Could not connect: &quot;refused&quot;"));
        assert!(!html.contains("<b>"));
        assert!(!html.contains("<a "));
    }

    #[test]
    fn settings_page_shows_values() {
        let settings = Settings {
            start_incognito: true,
            ..Settings::default()
        };
        let context = PageContext {
            history: &[],
            settings: &settings,
            incognito: false,
        };
        let html = render(InternalPage::Settings, &context);
        assert!(html.contains("https://www.google.com/search?q={query}"));
        assert!(html.contains("built-in list"));
    }
}
