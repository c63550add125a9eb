//! Observation of OS state.
//!
//! This module holds the one-shot leaves the samplers are built on: the focused
//! window, the clipboard text and the platform keyboard hook that reports
//! copy/paste key combinations. Platform specifics live in `macos`, `windows`
//! and `noop`; everything else is portable.

pub mod clipboard;
pub mod keys;
pub mod types;
pub mod window;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

// Re-export commonly used types
pub use clipboard::{ClipboardAccessor, SystemClipboard};
pub use keys::{KeyHook, KeyInput, ListenerError, ModifierTracker, TrackedKey};
pub use types::{
    Browser, BrowserHistoryRow, ClipboardEntry, Event, EventKind, WindowContext, WindowSnapshot,
};
pub use window::{resolve_window, ObservationError, SystemWindowInspector, WindowInspector};

#[cfg(target_os = "macos")]
pub use macos::{check_permission, MacOSKeyHook};

/// Platform keyboard hook type alias
#[cfg(target_os = "macos")]
pub type SystemKeyHook = MacOSKeyHook;

#[cfg(target_os = "windows")]
pub use windows::{check_permission, WindowsKeyHook};

/// Platform keyboard hook type alias
#[cfg(target_os = "windows")]
pub type SystemKeyHook = WindowsKeyHook;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{check_permission, UnsupportedKeyHook};

/// Platform keyboard hook type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type SystemKeyHook = UnsupportedKeyHook;
