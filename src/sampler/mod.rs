//! Samplers: observe state on a cadence, de-duplicate, persist.
//!
//! Every sampler runs on its own thread and shares only three things with the
//! rest of the collector: the record clock, its sinks and the [`RunFlags`]
//! used for cooperative cancellation and pausing.

pub mod browser;
pub mod clipboard;
pub mod dedup;
pub mod keyboard;
pub mod window;

pub use browser::BrowserHistorySampler;
pub use clipboard::{ClipboardRecorder, ClipboardSampler, Recorded};
pub use dedup::{ClipboardDedup, WindowDedup};
pub use keyboard::CopyPasteEventListener;
pub use window::ActiveWindowSampler;

use crate::sink::{Record, RecordSink};
use crate::transparency::TransparencyLog;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep; bounds how late a sampler sees a stop request.
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cancellation and consent flags shared by every sampler.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    shutdown: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl RunFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on shutdown. Returns false if shut down.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_shutdown() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Call `tick` every `interval` until shutdown, skipping ticks while paused.
pub fn run_every<F>(interval: Duration, flags: &RunFlags, mut tick: F)
where
    F: FnMut(),
{
    while !flags.is_shutdown() {
        if !flags.is_paused() {
            tick();
        }
        if !flags.sleep(interval) {
            break;
        }
    }
}

/// Append one record, reporting failures loudly. Returns whether it was persisted.
pub(crate) fn persist<R: Record>(sink: &RecordSink<R>, record: &R, log: &TransparencyLog) -> bool {
    match sink.append(record) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                stream = R::STREAM.name(),
                path = %sink.path().display(),
                "failed to persist record: {e}"
            );
            log.record_persistence_failure();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_wakes_on_shutdown() {
        let flags = RunFlags::new();
        let remote = flags.clone();
        let started = Instant::now();

        let handle = thread::spawn(move || flags.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(50));
        remote.request_shutdown();

        assert!(!handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_run_every_skips_paused_ticks() {
        let flags = RunFlags::new();
        flags.set_paused(true);

        let stopper = flags.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stopper.request_shutdown();
        });

        let mut ticks = 0;
        run_every(Duration::from_millis(1), &flags, || ticks += 1);
        handle.join().unwrap();
        assert_eq!(ticks, 0);
    }
}
