//! Record types produced by the collector.
//!
//! All records are immutable once constructed and carry the UTC timestamp
//! assigned when the underlying state was observed. Keystroke content never
//! appears in any of them: an [`Event`] only says that a copy or paste happened.

use crate::clock::{format_timestamp, option_timestamp_serde, timestamp_serde};
use crate::sink::{Record, Stream};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The focused window as resolved at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowContext {
    /// Window title, `None` when no window could be resolved
    pub title: Option<String>,
    /// Owning process name, empty if unresolved
    pub process: String,
    /// Owning process id, 0 if unresolved
    pub pid: u32,
}

impl WindowContext {
    pub fn new(title: impl Into<String>, process: impl Into<String>, pid: u32) -> Self {
        Self {
            title: Some(title.into()),
            process: process.into(),
            pid,
        }
    }

    /// The safe default used when the OS query fails.
    pub fn unresolved() -> Self {
        Self::default()
    }
}

/// A focus change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
    pub title: Option<String>,
    pub process: String,
    pub pid: u32,
}

impl WindowSnapshot {
    pub fn new(timestamp: DateTime<Utc>, window: WindowContext) -> Self {
        Self {
            timestamp,
            title: window.title,
            process: window.process,
            pid: window.pid,
        }
    }
}

/// A clipboard change together with the window that was focused at the time.
///
/// The timestamp doubles as the entry's identity when an [`Event`] refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub window_title: Option<String>,
    pub process: String,
    pub pid: u32,
}

impl ClipboardEntry {
    pub fn new(timestamp: DateTime<Utc>, content: String, window: WindowContext) -> Self {
        Self {
            timestamp,
            content,
            window_title: window.title,
            process: window.process,
            pid: window.pid,
        }
    }
}

/// Kind of clipboard action detected from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Copy,
    Paste,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Copy => "copy",
            EventKind::Paste => "paste",
        }
    }
}

/// A copy or paste action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
    pub event_type: EventKind,
    pub window_title: Option<String>,
    pub process: String,
    pub pid: u32,
    /// Identity of the clipboard entry this action refers to
    #[serde(default, with = "option_timestamp_serde")]
    pub associated_clipboard_timestamp: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(
        timestamp: DateTime<Utc>,
        event_type: EventKind,
        window: WindowContext,
        associated_clipboard_timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            timestamp,
            event_type,
            window_title: window.title,
            process: window.process,
            pid: window.pid,
            associated_clipboard_timestamp,
        }
    }
}

/// Supported browser families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    /// Chrome and Chromium (`History`, webkit epoch)
    Chrome,
    /// Firefox (`places.sqlite`, unix epoch)
    Firefox,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One visited URL sampled from a browser's local history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserHistoryRow {
    /// Sample time
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
    pub browser: Browser,
    pub url: String,
    pub title: String,
    pub visit_count: i64,
    /// ISO-8601 UTC, empty when the browser value could not be converted
    pub last_visit_time: String,
}

fn title_cell(title: &Option<String>) -> String {
    title.clone().unwrap_or_default()
}

impl Record for WindowSnapshot {
    const STREAM: Stream = Stream::Windows;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn row(&self) -> Vec<String> {
        vec![
            format_timestamp(&self.timestamp),
            title_cell(&self.title),
            self.process.clone(),
            self.pid.to_string(),
        ]
    }
}

impl Record for ClipboardEntry {
    const STREAM: Stream = Stream::Clipboard;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn row(&self) -> Vec<String> {
        vec![
            format_timestamp(&self.timestamp),
            self.content.clone(),
            title_cell(&self.window_title),
            self.process.clone(),
            self.pid.to_string(),
        ]
    }
}

impl Record for Event {
    const STREAM: Stream = Stream::Events;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn row(&self) -> Vec<String> {
        vec![
            format_timestamp(&self.timestamp),
            self.event_type.as_str().to_string(),
            title_cell(&self.window_title),
            self.process.clone(),
            self.pid.to_string(),
            self.associated_clipboard_timestamp
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default(),
        ]
    }
}

impl Record for BrowserHistoryRow {
    const STREAM: Stream = Stream::BrowserHistory;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn row(&self) -> Vec<String> {
        vec![
            format_timestamp(&self.timestamp),
            self.browser.as_str().to_string(),
            self.url.clone(),
            self.title.clone(),
            self.visit_count.to_string(),
            self.last_visit_time.clone(),
        ]
    }
}
