//! Focused-window sampler.

use crate::clock::SharedClock;
use crate::collector::types::WindowSnapshot;
use crate::collector::window::{resolve_window, WindowInspector};
use crate::sampler::dedup::WindowDedup;
use crate::sampler::{persist, run_every, RunFlags};
use crate::sink::SharedSink;
use crate::transparency::SharedTransparencyLog;
use std::sync::Arc;
use std::time::Duration;

/// Emits a [`WindowSnapshot`] whenever the focused window's title changes.
pub struct ActiveWindowSampler {
    inspector: Arc<dyn WindowInspector>,
    sink: SharedSink<WindowSnapshot>,
    clock: SharedClock,
    log: SharedTransparencyLog,
    dedup: WindowDedup,
}

impl ActiveWindowSampler {
    pub fn new(
        inspector: Arc<dyn WindowInspector>,
        sink: SharedSink<WindowSnapshot>,
        clock: SharedClock,
        log: SharedTransparencyLog,
    ) -> Self {
        Self {
            inspector,
            sink,
            clock,
            log,
            dedup: WindowDedup::new(),
        }
    }

    /// One observation. Returns true if a snapshot was persisted.
    pub fn tick(&mut self) -> bool {
        let window = resolve_window(self.inspector.as_ref());
        if !self.dedup.is_new(&window.title) {
            return false;
        }

        let snapshot = WindowSnapshot::new(self.clock.now(), window);
        if !persist(&self.sink, &snapshot, &self.log) {
            // Dedup state is left alone so the next tick retries
            return false;
        }

        tracing::info!(
            stream = "window",
            "{} ({} pid={})",
            snapshot.title.as_deref().unwrap_or("<none>"),
            snapshot.process,
            snapshot.pid
        );
        self.log.record_window();
        self.dedup.remember(snapshot.title);
        true
    }

    /// Sample every `interval` until shutdown.
    pub fn run(mut self, interval: Duration, flags: RunFlags) {
        tracing::debug!("window sampler started ({interval:?})");
        run_every(interval, &flags, || {
            self.tick();
        });
        tracing::debug!("window sampler stopped");
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
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Script(Mutex<VecDeque<Result<WindowContext, ObservationError>>>);

    impl WindowInspector for Script {
        fn focused_window(&self) -> Result<WindowContext, ObservationError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ObservationError::NoFocusedWindow))
        }
    }

    fn sampler(
        dir: &std::path::Path,
        script: Vec<Result<WindowContext, ObservationError>>,
    ) -> ActiveWindowSampler {
        let sink = Arc::new(RecordSink::open(dir, SinkFormat::Json).unwrap());
        ActiveWindowSampler::new(
            Arc::new(Script(Mutex::new(script.into()))),
            sink,
            Arc::new(MonotonicClock::new()),
            create_shared_log(),
        )
    }

    #[test]
    fn test_failed_lookup_is_recorded_once_as_no_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler(
            dir.path(),
            vec![
                Err(ObservationError::Platform("boom".into())),
                Err(ObservationError::NoFocusedWindow),
                Ok(WindowContext::new("Editor", "code", 10)),
            ],
        );

        assert!(sampler.tick());
        assert!(!sampler.tick());
        assert!(sampler.tick());

        let records: Vec<WindowSnapshot> =
            crate::sink::json::read_records(sampler.sink.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, None);
        assert_eq!(records[0].pid, 0);
        assert_eq!(records[1].title.as_deref(), Some("Editor"));
        assert_eq!(sampler.log.session_counts().windows_recorded, 2);
    }

    #[test]
    fn test_same_title_other_process_is_not_new() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler(
            dir.path(),
            vec![
                Ok(WindowContext::new("New Tab", "chrome", 1)),
                Ok(WindowContext::new("New Tab", "firefox", 2)),
            ],
        );

        assert!(sampler.tick());
        assert!(!sampler.tick());
    }

    #[test]
    fn test_failed_append_retries_same_title() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = sampler(
            dir.path(),
            vec![
                Ok(WindowContext::new("Editor", "code", 10)),
                Ok(WindowContext::new("Editor", "code", 10)),
            ],
        );
        let path = sampler.sink.path().to_path_buf();

        // A directory in place of the stream file makes every append fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        assert!(!sampler.tick());
        assert_eq!(sampler.log.session_counts().persistence_failures, 1);
        assert_eq!(sampler.log.session_counts().windows_recorded, 0);

        std::fs::remove_dir(&path).unwrap();
        std::fs::write(&path, "[]").unwrap();
        assert!(sampler.tick());

        let records: Vec<WindowSnapshot> = crate::sink::json::read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Editor"));
        assert_eq!(sampler.log.session_counts().windows_recorded, 1);
    }
}
