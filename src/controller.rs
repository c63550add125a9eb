//! Collector lifecycle.
//!
//! The controller is the only piece that knows every sampler. `start` opens
//! the sinks and launches one thread per enabled sampler; `stop` raises the
//! shared shutdown flag and gives each thread a bounded time to finish.
//! Threads that miss the deadline are abandoned, never killed.

use crate::clock::{MonotonicClock, SharedClock};
use crate::collector::clipboard::{ClipboardAccessor, SystemClipboard};
use crate::collector::keys::KeyHook;
use crate::collector::window::{SystemWindowInspector, WindowInspector};
use crate::collector::SystemKeyHook;
use crate::config::Config;
use crate::history::{HistoryStoreReader, SqliteHistoryReader};
use crate::sampler::{
    ActiveWindowSampler, BrowserHistorySampler, ClipboardDedup, ClipboardRecorder,
    ClipboardSampler, CopyPasteEventListener, RunFlags,
};
use crate::sink::{SinkError, StreamSet};
use crate::transparency::SharedTransparencyLog;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// The OS-facing leaves the samplers observe through.
pub struct CollectorSources {
    pub window: Arc<dyn WindowInspector>,
    pub clipboard: Arc<dyn ClipboardAccessor>,
    pub history: Arc<dyn HistoryStoreReader>,
    /// Taken by the keyboard listener on start
    pub key_hook: Option<Box<dyn KeyHook>>,
}

impl CollectorSources {
    /// The real platform implementations.
    pub fn system() -> Self {
        Self {
            window: Arc::new(SystemWindowInspector::new()),
            clipboard: Arc::new(SystemClipboard::new()),
            history: Arc::new(SqliteHistoryReader::new()),
            key_hook: Some(Box::new(SystemKeyHook::new())),
        }
    }
}

/// Lifecycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Not started, or fully stopped
    Idle,
    Running,
    /// Shutdown requested, waiting for samplers
    Stopping,
}

/// Errors that can occur while starting the collector.
#[derive(Debug)]
pub enum ControllerError {
    AlreadyRunning,
    Sink(SinkError),
}

impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerError::AlreadyRunning => write!(f, "Collector is already running"),
            ControllerError::Sink(e) => write!(f, "Could not open record streams: {e}"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<SinkError> for ControllerError {
    fn from(e: SinkError) -> Self {
        ControllerError::Sink(e)
    }
}

/// How the samplers ended after [`CollectorController::stop`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Samplers that exited within the timeout
    pub joined: Vec<&'static str>,
    /// Samplers still running at the deadline
    pub abandoned: Vec<&'static str>,
}

/// Starts, pauses and stops every sampler.
pub struct CollectorController {
    config: Config,
    sources: CollectorSources,
    log: SharedTransparencyLog,
    clock: SharedClock,
    flags: RunFlags,
    state: ControllerState,
    workers: Vec<(&'static str, JoinHandle<()>)>,
}

impl CollectorController {
    pub fn new(config: Config, sources: CollectorSources, log: SharedTransparencyLog) -> Self {
        let flags = RunFlags::new();
        flags.set_paused(config.paused);
        Self {
            config,
            sources,
            log,
            clock: Arc::new(MonotonicClock::new()),
            flags,
            state: ControllerState::Idle,
            workers: Vec::new(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Names of the samplers started by the last `start`.
    pub fn running_samplers(&self) -> Vec<&'static str> {
        self.workers.iter().map(|(name, _)| *name).collect()
    }

    /// Open the streams and launch the enabled samplers.
    ///
    /// A keyboard hook that cannot be installed disables copy/paste events
    /// only; everything else keeps running.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        if self.state != ControllerState::Idle {
            return Err(ControllerError::AlreadyRunning);
        }

        let streams = StreamSet::open(&self.config.output_dir, self.config.format)?;
        // A fresh flag set per run; a stopped run's abandoned threads keep theirs
        let flags = RunFlags::new();
        flags.set_paused(self.flags.is_paused());
        self.flags = flags;

        let enabled = self.config.sources.clone();

        if enabled.window {
            let sampler = ActiveWindowSampler::new(
                self.sources.window.clone(),
                streams.windows.clone(),
                self.clock.clone(),
                self.log.clone(),
            );
            let interval = self.config.window_poll_interval;
            let flags = self.flags.clone();
            self.spawn("window", move || sampler.run(interval, flags));
        }

        let recorder = Arc::new(ClipboardRecorder::new(
            Arc::new(ClipboardDedup::new()),
            self.sources.window.clone(),
            streams.clipboard.clone(),
            self.clock.clone(),
            self.log.clone(),
        ));

        if enabled.clipboard {
            let sampler = ClipboardSampler::new(self.sources.clipboard.clone(), recorder.clone());
            let interval = self.config.clipboard_poll_interval;
            let flags = self.flags.clone();
            self.spawn("clipboard", move || sampler.run(interval, flags));
        }

        if enabled.keyboard {
            self.start_keyboard(recorder, &streams);
        }

        if enabled.browser_history {
            let sampler = BrowserHistorySampler::new(
                self.sources.history.clone(),
                self.config.history_sources.clone(),
                self.config.history_row_limit,
                streams.browser_history.clone(),
                self.clock.clone(),
                self.log.clone(),
            );
            let interval = self.config.history_poll_interval;
            let flags = self.flags.clone();
            self.spawn("browser_history", move || sampler.run(interval, flags));
        }

        self.state = ControllerState::Running;
        tracing::info!(
            output = %self.config.output_dir.display(),
            format = self.config.format.extension(),
            samplers = ?self.running_samplers(),
            "collector started"
        );
        Ok(())
    }

    fn start_keyboard(&mut self, recorder: Arc<ClipboardRecorder>, streams: &StreamSet) {
        let Some(hook) = self.sources.key_hook.take() else {
            tracing::warn!("keyboard listener unavailable: hook already consumed");
            return;
        };

        let listener = CopyPasteEventListener::new(
            hook,
            self.sources.clipboard.clone(),
            self.sources.window.clone(),
            recorder,
            streams.events.clone(),
            self.clock.clone(),
            self.log.clone(),
        );
        match listener.spawn(self.flags.clone()) {
            Ok(handle) => self.workers.push(("keyboard", handle)),
            Err(e) => tracing::error!("copy/paste events disabled: {e}"),
        }
    }

    fn spawn<F>(&mut self, name: &'static str, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.workers.push((name, thread::spawn(body)));
    }

    /// Suspend or resume sampling without stopping any thread.
    pub fn set_paused(&self, paused: bool) {
        self.flags.set_paused(paused);
        tracing::info!(paused, "collection {}", if paused { "paused" } else { "resumed" });
    }

    pub fn is_paused(&self) -> bool {
        self.flags.is_paused()
    }

    /// Request shutdown and wait up to the configured timeout for each sampler.
    pub fn stop(&mut self) -> StopReport {
        if self.state != ControllerState::Running {
            return StopReport::default();
        }

        self.state = ControllerState::Stopping;
        self.flags.request_shutdown();

        let mut report = StopReport::default();
        for (name, handle) in self.workers.drain(..) {
            let deadline = Instant::now() + self.config.shutdown_timeout;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }

            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!(sampler = name, "sampler panicked");
                }
                report.joined.push(name);
            } else {
                // Dropping the handle detaches the thread
                tracing::warn!(sampler = name, "sampler did not stop in time; abandoning it");
                report.abandoned.push(name);
            }
        }

        if let Err(e) = self.log.save() {
            tracing::warn!("could not save transparency stats: {e}");
        }

        self.state = ControllerState::Idle;
        tracing::info!(
            joined = report.joined.len(),
            abandoned = report.abandoned.len(),
            "collector stopped"
        );
        report
    }
}

impl Drop for CollectorController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::keys::{KeyInput, ListenerError};
    use crate::collector::types::WindowContext;
    use crate::collector::window::ObservationError;
    use crate::config::SourceConfig;
    use crate::history::{HistoryError, HistorySource, HistoryVisit};
    use crate::transparency::create_shared_log;
    use crossbeam_channel::Sender;

    struct Quiet;

    impl WindowInspector for Quiet {
        fn focused_window(&self) -> Result<WindowContext, ObservationError> {
            Err(ObservationError::NoFocusedWindow)
        }
    }

    impl ClipboardAccessor for Quiet {
        fn read_text(&self) -> Result<Option<String>, ObservationError> {
            Ok(None)
        }
    }

    impl HistoryStoreReader for Quiet {
        fn read_recent(
            &self,
            _source: &HistorySource,
            _limit: usize,
        ) -> Result<Vec<HistoryVisit>, HistoryError> {
            Ok(Vec::new())
        }
    }

    struct DeniedHook;

    impl KeyHook for DeniedHook {
        fn install(&mut self, _sender: Sender<KeyInput>) -> Result<(), ListenerError> {
            Err(ListenerError::PermissionDenied)
        }

        fn uninstall(&mut self) {}
    }

    fn controller(dir: &std::path::Path) -> CollectorController {
        let config = Config {
            output_dir: dir.join("out"),
            data_path: dir.to_path_buf(),
            window_poll_interval: Duration::from_millis(10),
            clipboard_poll_interval: Duration::from_millis(10),
            history_poll_interval: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(2),
            sources: SourceConfig::default(),
            history_sources: Vec::new(),
            ..Config::default()
        };
        let sources = CollectorSources {
            window: Arc::new(Quiet),
            clipboard: Arc::new(Quiet),
            history: Arc::new(Quiet),
            key_hook: Some(Box::new(DeniedHook)),
        };
        CollectorController::new(config, sources, create_shared_log())
    }

    #[test]
    fn test_denied_hook_keeps_other_samplers() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());

        controller.start().unwrap();
        assert_eq!(controller.state(), ControllerState::Running);
        assert_eq!(
            controller.running_samplers(),
            vec!["window", "clipboard", "browser_history"]
        );

        let report = controller.stop();
        assert_eq!(report.joined.len(), 3);
        assert!(report.abandoned.is_empty());
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());

        controller.start().unwrap();
        assert!(matches!(
            controller.start(),
            Err(ControllerError::AlreadyRunning)
        ));
        controller.stop();
    }

    #[test]
    fn test_start_creates_all_streams() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());
        controller.start().unwrap();
        controller.stop();

        for stream in crate::sink::Stream::ALL {
            assert!(dir.path().join("out").join(stream.file_name(Default::default())).exists());
        }
        assert!(dir.path().join("out").join("windows.csv").exists());
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());
        assert_eq!(controller.stop(), StopReport::default());
    }
}
