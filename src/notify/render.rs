//! Message rendering for watch events.

use std::fmt::Write as _;
use std::time::Duration;

use crate::models::Watch;
use crate::notify::WatchEvent;
use crate::notify::diff::LineDiff;
use crate::services::Headers;

/// Unchanged lines shown around every changed line.
const DIFF_CONTEXT: usize = 3;

const DIFF_CSS: &str = "table.diff{border-collapse:collapse;font-family:monospace;white-space:pre-wrap}\
table.diff td{padding:0 4px;vertical-align:top}\
tr.ins{background:#e6ffec}tr.del{background:#ffebe9}tr.skip{color:#888}";

const BINARY_CHANGE_NOTE: &str =
    "Binary content changed; the difference is not representable as text.";

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub html: String,
}

/// Render the subject and HTML body for an event on `watch`.
pub fn render(watch: &Watch, event: &WatchEvent) -> Message {
    match event {
        WatchEvent::Changed {
            duration,
            status,
            old,
            new,
        } => {
            let mut text = format!(
                "Name: {}\nURL: {}\nRequest Duration: {}\nStatus: {}\nBodylen: {}",
                watch.name,
                watch.url,
                format_duration(*duration),
                status,
                new.len()
            );
            let old = String::from_utf8_lossy(old);
            let new = String::from_utf8_lossy(new);
            let diff = LineDiff::new(&old, &new);
            // Bytes that differ only inside invalid UTF-8 collapse to the same text.
            let table = if diff.has_changes() {
                let _ = write!(
                    text,
                    "\nChanged lines: +{} -{}",
                    diff.added_count(),
                    diff.removed_count()
                );
                diff.to_html(DIFF_CONTEXT)
            } else {
                format!("<p>{BINARY_CHANGE_NOTE}</p>\n")
            };
            Message {
                subject: format!("Detected change on {}", watch.name),
                html: html_document(&text, Some(&table)),
            }
        }
        WatchEvent::InvalidResponse(response) => {
            let text = format!(
                "Name: {}\nURL: {}\nRequest Duration: {}\nStatus: {}\nBodylen: {}\nHeader:\n{}\nBody:\n{}",
                watch.name,
                watch.url,
                format_duration(response.duration),
                response.status,
                response.body.len(),
                format_headers(&response.headers),
                String::from_utf8_lossy(&response.body)
            );
            Message {
                subject: format!("Invalid response for {}", watch.name),
                html: html_document(&text, None),
            }
        }
        WatchEvent::Failed { kind, error } => {
            let text = format!(
                "Name: {}\nURL: {}\nError kind: {}\nError: {}",
                watch.name, watch.url, kind, error
            );
            Message {
                subject: format!("Error on {}", watch.name),
                html: html_document(&text, None),
            }
        }
    }
}

/// Wrap escaped plain text, plus an optional diff table, into an HTML page.
fn html_document(text: &str, diff: Option<&str>) -> String {
    let body = escape_html(text).replace('\n', "<br>\n");
    match diff {
        Some(diff) => format!(
            "<html><head><style>{DIFF_CSS}</style></head><body>{body}<br><br>\n{diff}</body></html>"
        ),
        None => format!("<html><body>{body}</body></html>"),
    }
}

/// One `name: value1, value2` line per header.
pub fn format_headers(headers: &Headers) -> String {
    let mut out = String::new();
    for (name, values) in headers {
        let _ = writeln!(out, "{}: {}", name, values.join(", "));
    }
    out
}

fn format_duration(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}

/// Escape the characters that are special in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
