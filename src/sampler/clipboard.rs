//! Clipboard sampler and the recording path it shares with the key listener.

use crate::clock::SharedClock;
use crate::collector::clipboard::ClipboardAccessor;
use crate::collector::types::ClipboardEntry;
use crate::collector::window::{resolve_window, WindowInspector};
use crate::sampler::dedup::ClipboardDedup;
use crate::sampler::{persist, run_every, RunFlags};
use crate::sink::SharedSink;
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Result of [`ClipboardRecorder::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// A new entry was persisted with this identity
    New(DateTime<Utc>),
    /// The content is the last recorded entry's
    Unchanged(DateTime<Utc>),
    /// Persisting failed; dedup state was not updated
    Failed,
}

impl Recorded {
    /// Identity of the entry holding the content.
    pub fn identity(&self) -> Option<DateTime<Utc>> {
        match self {
            Recorded::New(ts) | Recorded::Unchanged(ts) => Some(*ts),
            Recorded::Failed => None,
        }
    }
}

/// Turns clipboard contents into [`ClipboardEntry`] records, at most once per
/// distinct consecutive content, no matter how many threads observe it.
pub struct ClipboardRecorder {
    dedup: Arc<ClipboardDedup>,
    inspector: Arc<dyn WindowInspector>,
    sink: SharedSink<ClipboardEntry>,
    clock: SharedClock,
    log: SharedTransparencyLog,
}

impl ClipboardRecorder {
    pub fn new(
        dedup: Arc<ClipboardDedup>,
        inspector: Arc<dyn WindowInspector>,
        sink: SharedSink<ClipboardEntry>,
        clock: SharedClock,
        log: SharedTransparencyLog,
    ) -> Self {
        Self {
            dedup,
            inspector,
            sink,
            clock,
            log,
        }
    }

    pub fn dedup(&self) -> &ClipboardDedup {
        &self.dedup
    }

    /// Record `content` unless it is the last recorded content.
    ///
    /// The dedup lock is held from the comparison until the state update, so
    /// two observers of the same change produce a single entry.
    pub fn record(&self, content: &str) -> Recorded {
        let mut state = self.dedup.lock();
        if let (true, Some(identity)) = (state.matches(content), state.identity()) {
            return Recorded::Unchanged(identity);
        }

        let window = resolve_window(self.inspector.as_ref());
        let entry = ClipboardEntry::new(self.clock.now(), content.to_string(), window);
        if !persist(&self.sink, &entry, &self.log) {
            return Recorded::Failed;
        }

        tracing::info!(
            stream = "clipboard",
            "clipboard changed (len={}) in {} pid={}",
            content.chars().count(),
            entry.process,
            entry.pid
        );
        self.log.record_clipboard_entry();
        state.remember(entry.content, entry.timestamp);
        Recorded::New(entry.timestamp)
    }
}

/// Read the clipboard, treating failures and empty text as "nothing".
pub(crate) fn read_clipboard(clipboard: &dyn ClipboardAccessor) -> Option<String> {
    match clipboard.read_text() {
        Ok(Some(text)) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("clipboard read failed: {e}");
            None
        }
    }
}

/// Polls the clipboard and records changes.
pub struct ClipboardSampler {
    clipboard: Arc<dyn ClipboardAccessor>,
    recorder: Arc<ClipboardRecorder>,
}

impl ClipboardSampler {
    pub fn new(clipboard: Arc<dyn ClipboardAccessor>, recorder: Arc<ClipboardRecorder>) -> Self {
        Self {
            clipboard,
            recorder,
        }
    }

    /// One poll. Returns the identity of a newly recorded entry.
    pub fn tick(&self) -> Option<DateTime<Utc>> {
        let content = read_clipboard(self.clipboard.as_ref())?;
        if !self.recorder.dedup().differs(&content) {
            return None;
        }
        match self.recorder.record(&content) {
            Recorded::New(identity) => Some(identity),
            // A concurrent copy recorded it first
            Recorded::Unchanged(_) | Recorded::Failed => None,
        }
    }

    /// Poll every `interval` until shutdown.
    pub fn run(self, interval: Duration, flags: RunFlags) {
        tracing::debug!("clipboard sampler started ({interval:?})");
        run_every(interval, &flags, || {
            self.tick();
        });
        tracing::debug!("clipboard sampler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::collector::types::WindowContext;
    use crate::collector::window::ObservationError;
    use crate::sink::{RecordSink, SinkFormat};
    use crate::transparency::create_shared_log;
    use std::sync::Mutex;

    struct FixedWindow;

    impl WindowInspector for FixedWindow {
        fn focused_window(&self) -> Result<WindowContext, ObservationError> {
            Ok(WindowContext::new("Notes", "notes", 3))
        }
    }

    struct Board(Mutex<Result<Option<String>, ObservationError>>);

    impl Board {
        fn set(&self, value: Result<Option<String>, ObservationError>) {
            *self.0.lock().unwrap() = value;
        }
    }

    impl ClipboardAccessor for Board {
        fn read_text(&self) -> Result<Option<String>, ObservationError> {
            match &*self.0.lock().unwrap() {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(ObservationError::Clipboard(e.to_string())),
            }
        }
    }

    fn setup(dir: &std::path::Path) -> (Arc<Board>, ClipboardSampler, SharedSink<ClipboardEntry>) {
        let sink = Arc::new(RecordSink::open(dir, SinkFormat::Csv).unwrap());
        let recorder = Arc::new(ClipboardRecorder::new(
            Arc::new(ClipboardDedup::new()),
            Arc::new(FixedWindow),
            sink.clone(),
            Arc::new(MonotonicClock::new()),
            create_shared_log(),
        ));
        let board = Arc::new(Board(Mutex::new(Ok(None))));
        (board.clone(), ClipboardSampler::new(board, recorder), sink)
    }

    #[test]
    fn test_changes_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        let (board, sampler, sink) = setup(dir.path());

        assert_eq!(sampler.tick(), None);
        board.set(Ok(Some("foo".into())));
        let first = sampler.tick();
        assert!(first.is_some());
        assert_eq!(sampler.tick(), None);

        board.set(Ok(Some("bar".into())));
        let second = sampler.tick();
        assert!(second > first);

        // Back to earlier content is a change again
        board.set(Ok(Some("foo".into())));
        assert!(sampler.tick().is_some());
        assert_eq!(sink.len().unwrap(), 3);
    }

    #[test]
    fn test_empty_and_failed_reads_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (board, sampler, sink) = setup(dir.path());

        board.set(Ok(Some(String::new())));
        assert_eq!(sampler.tick(), None);
        board.set(Err(ObservationError::Clipboard("locked".into())));
        assert_eq!(sampler.tick(), None);
        assert_eq!(sink.len().unwrap(), 0);
    }

    #[test]
    fn test_record_reuses_identity_for_same_content() {
        let dir = tempfile::tempdir().unwrap();
        let (_board, sampler, sink) = setup(dir.path());

        let a = sampler.recorder.record("same");
        let b = sampler.recorder.record("same");
        assert!(matches!(a, Recorded::New(_)));
        assert!(matches!(b, Recorded::Unchanged(_)));
        assert_eq!(a.identity(), b.identity());
        assert_eq!(sink.len().unwrap(), 1);
    }

    #[test]
    fn test_control_characters_escaped_in_csv() {
        let dir = tempfile::tempdir().unwrap();
        let (board, sampler, sink) = setup(dir.path());

        board.set(Ok(Some("line one\nline two\tend".into())));
        sampler.tick();

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.contains("line one\\nline two\\tend"));
    }

    #[test]
    fn test_failed_append_retries_same_content() {
        let dir = tempfile::tempdir().unwrap();
        let (board, sampler, sink) = setup(dir.path());
        let path = sink.path().to_path_buf();
        let log = sampler.recorder.log.clone();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        board.set(Ok(Some("foo".into())));
        assert_eq!(sampler.tick(), None);
        assert_eq!(log.session_counts().persistence_failures, 1);
        assert!(sampler.recorder.dedup().differs("foo"));

        std::fs::remove_dir(&path).unwrap();
        std::fs::write(&path, "timestamp,content,window_title,process,pid\n").unwrap();
        assert!(sampler.tick().is_some());
        assert_eq!(sink.len().unwrap(), 1);
        assert_eq!(log.session_counts().clipboard_entries, 1);
    }
}
