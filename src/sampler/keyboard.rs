//! Copy/paste detection from the global keyboard hook.
//!
//! The platform hook only pushes [`KeyInput`]s into a bounded channel and
//! returns. A consumer thread owned by the listener turns them into actions and
//! does the slow part (window lookup, clipboard read, disk writes), so a stuck
//! clipboard never stalls system-wide input delivery.

use crate::clock::SharedClock;
use crate::collector::clipboard::ClipboardAccessor;
use crate::collector::keys::{KeyHook, KeyInput, ListenerError, ModifierTracker, KEY_CHANNEL_CAPACITY};
use crate::collector::types::{Event, EventKind};
use crate::collector::window::{resolve_window, WindowInspector};
use crate::sampler::clipboard::{read_clipboard, ClipboardRecorder};
use crate::sampler::{persist, RunFlags, SLEEP_SLICE};
use crate::sink::SharedSink;
use crate::transparency::SharedTransparencyLog;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Emits copy/paste [`Event`]s, recording the copied clipboard content on the way.
pub struct CopyPasteEventListener {
    hook: Box<dyn KeyHook>,
    clipboard: Arc<dyn ClipboardAccessor>,
    inspector: Arc<dyn WindowInspector>,
    recorder: Arc<ClipboardRecorder>,
    events: SharedSink<Event>,
    clock: SharedClock,
    log: SharedTransparencyLog,
    tracker: ModifierTracker,
}

impl CopyPasteEventListener {
    pub fn new(
        hook: Box<dyn KeyHook>,
        clipboard: Arc<dyn ClipboardAccessor>,
        inspector: Arc<dyn WindowInspector>,
        recorder: Arc<ClipboardRecorder>,
        events: SharedSink<Event>,
        clock: SharedClock,
        log: SharedTransparencyLog,
    ) -> Self {
        Self {
            hook,
            clipboard,
            inspector,
            recorder,
            events,
            clock,
            log,
            tracker: ModifierTracker::new(),
        }
    }

    /// Install the hook and start the consumer thread.
    ///
    /// A registration failure is returned before any thread is started; it
    /// disables this listener only.
    pub fn spawn(mut self, flags: RunFlags) -> Result<JoinHandle<()>, ListenerError> {
        let (sender, receiver) = bounded(KEY_CHANNEL_CAPACITY);
        self.hook.install(sender)?;
        tracing::debug!("keyboard hook installed");

        Ok(thread::spawn(move || self.run(receiver, flags)))
    }

    /// Consume key inputs until shutdown, then remove the hook.
    fn run(mut self, receiver: Receiver<KeyInput>, flags: RunFlags) {
        while !flags.is_shutdown() {
            match receiver.recv_timeout(SLEEP_SLICE) {
                Ok(input) => {
                    // Modifiers are tracked while paused so resuming mid-chord is correct
                    let action = self.tracker.process(input);
                    if let (Some(kind), false) = (action, flags.is_paused()) {
                        self.handle(kind);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("keyboard hook disconnected");
                    break;
                }
            }
        }

        self.hook.uninstall();
        tracing::debug!("keyboard hook removed");
    }

    /// Feed one raw key input. Returns the event it produced, if any.
    pub fn process(&mut self, input: KeyInput) -> Option<Event> {
        let kind = self.tracker.process(input)?;
        self.handle(kind)
    }

    /// Record a detected copy or paste. Returns the persisted event.
    pub fn handle(&self, kind: EventKind) -> Option<Event> {
        let window = resolve_window(self.inspector.as_ref());
        let content = read_clipboard(self.clipboard.as_ref());

        let associated = content.and_then(|content| match kind {
            EventKind::Copy => self.recorder.record(&content).identity(),
            // A paste never creates an entry
            EventKind::Paste => self.recorder.dedup().identity_for(&content),
        });

        let event = Event::new(self.clock.now(), kind, window, associated);
        if !persist(&self.events, &event, &self.log) {
            return None;
        }

        tracing::info!(
            stream = "event",
            "{} in {} pid={} (linked={})",
            kind.as_str(),
            event.process,
            event.pid,
            associated.is_some()
        );
        match kind {
            EventKind::Copy => self.log.record_copy_event(),
            EventKind::Paste => self.log.record_paste_event(),
        }
        Some(event)
    }
}
