//! Last-emitted state used to suppress duplicate records.
//!
//! Nothing here is persisted: a fresh process emits the current window and
//! clipboard once, which marks the start of a session.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Last emitted window title. Owned by the window sampler alone.
#[derive(Debug, Default)]
pub struct WindowDedup {
    /// `None` until the first emission; the inner `None` is "no window".
    last_title: Option<Option<String>>,
}

impl WindowDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new(&self, title: &Option<String>) -> bool {
        self.last_title.as_ref() != Some(title)
    }

    pub fn remember(&mut self, title: Option<String>) {
        self.last_title = Some(title);
    }
}

/// The last recorded clipboard entry.
#[derive(Debug, Default)]
pub struct ClipboardState {
    content: Option<String>,
    identity: Option<DateTime<Utc>>,
}

impl ClipboardState {
    pub fn matches(&self, content: &str) -> bool {
        self.content.as_deref() == Some(content)
    }

    /// Identity of the last entry.
    pub fn identity(&self) -> Option<DateTime<Utc>> {
        self.identity
    }

    pub fn remember(&mut self, content: String, identity: DateTime<Utc>) {
        self.content = Some(content);
        self.identity = Some(identity);
    }
}

/// Clipboard dedup state shared by the clipboard poller and the key listener.
///
/// Both must hold the lock across read, compare, persist and update.
#[derive(Debug, Default)]
pub struct ClipboardDedup {
    state: Mutex<ClipboardState>,
}

impl ClipboardDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ClipboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unguarded pre-check; callers re-check under [`ClipboardDedup::lock`].
    pub fn differs(&self, content: &str) -> bool {
        !self.lock().matches(content)
    }

    /// Identity of the last entry if it holds `content`.
    pub fn identity_for(&self, content: &str) -> Option<DateTime<Utc>> {
        let state = self.lock();
        if state.matches(content) {
            state.identity()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_window_always_new() {
        let mut dedup = WindowDedup::new();
        assert!(dedup.is_new(&None));

        dedup.remember(None);
        assert!(!dedup.is_new(&None));
        assert!(dedup.is_new(&Some("Editor".to_string())));

        dedup.remember(Some("Editor".to_string()));
        assert!(!dedup.is_new(&Some("Editor".to_string())));
        assert!(dedup.is_new(&None));
    }

    #[test]
    fn test_clipboard_identity_follows_content() {
        let dedup = ClipboardDedup::new();
        assert!(dedup.differs("foo"));
        assert_eq!(dedup.identity_for("foo"), None);

        let ts = Utc::now();
        dedup.lock().remember("foo".to_string(), ts);

        assert!(!dedup.differs("foo"));
        assert_eq!(dedup.identity_for("foo"), Some(ts));
        assert_eq!(dedup.identity_for("bar"), None);
    }
}
