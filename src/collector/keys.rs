//! Platform-independent keyboard model for copy/paste detection.
//!
//! Privacy guarantee: a platform hook only ever forwards the four keys in
//! [`TrackedKey`]. Every other key is dropped inside the hook callback, so no
//! typed character leaves the OS callback and nothing is buffered.

use crate::collector::types::EventKind;
use crossbeam_channel::Sender;
use std::collections::HashSet;

/// Capacity of the channel between the hook callback and its consumer.
pub const KEY_CHANNEL_CAPACITY: usize = 256;

/// The only keys a hook reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedKey {
    /// Left (or unsided) Control
    Control,
    RightControl,
    /// Left Command on macOS, the left Windows key elsewhere
    Command,
    RightCommand,
    C,
    V,
}

impl TrackedKey {
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            TrackedKey::Control
                | TrackedKey::RightControl
                | TrackedKey::Command
                | TrackedKey::RightCommand
        )
    }
}

/// A raw key transition pushed by the hook callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Pressed(TrackedKey),
    Released(TrackedKey),
}

/// Live set of held keys; turns key transitions into clipboard actions.
///
/// Each physical modifier is tracked on its own. A C or V that is already
/// down (autorepeat) completes no further action until it is released.
#[derive(Debug, Default)]
pub struct ModifierTracker {
    held: HashSet<TrackedKey>,
    letters_down: HashSet<TrackedKey>,
}

impl ModifierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transition. Returns the action a C/V press completes, if any.
    pub fn process(&mut self, input: KeyInput) -> Option<EventKind> {
        match input {
            KeyInput::Pressed(key) if key.is_modifier() => {
                self.held.insert(key);
                None
            }
            KeyInput::Released(key) if key.is_modifier() => {
                self.held.remove(&key);
                None
            }
            KeyInput::Pressed(key) => {
                if !self.modifier_held() || !self.letters_down.insert(key) {
                    return None;
                }
                match key {
                    TrackedKey::C => Some(EventKind::Copy),
                    TrackedKey::V => Some(EventKind::Paste),
                    _ => None,
                }
            }
            KeyInput::Released(key) => {
                self.letters_down.remove(&key);
                None
            }
        }
    }

    pub fn modifier_held(&self) -> bool {
        !self.held.is_empty()
    }
}

/// A system-wide low-level key hook.
///
/// `install` registers the hook and starts forwarding [`KeyInput`]s into
/// `sender` (without blocking: inputs are dropped when the channel is full).
/// `uninstall` removes every registered hook and must be safe to call twice.
pub trait KeyHook: Send {
    fn install(&mut self, sender: Sender<KeyInput>) -> Result<(), ListenerError>;

    fn uninstall(&mut self);
}

/// Errors that can occur while registering the keyboard hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    AlreadyRunning,
    PermissionDenied,
    HookInstallationFailed,
    Unsupported(String),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::AlreadyRunning => write!(f, "Keyboard listener is already running"),
            ListenerError::PermissionDenied => {
                write!(f, "Input Monitoring permission not granted")
            }
            ListenerError::HookInstallationFailed => write!(f, "Failed to install keyboard hook"),
            ListenerError::Unsupported(platform) => {
                write!(f, "Keyboard hook not supported on {platform}")
            }
        }
    }
}

impl std::error::Error for ListenerError {}
