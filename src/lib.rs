//! Activity Collector - consent-based local desktop and browser activity recording.
//!
//! This library samples the focused window, the clipboard, copy/paste
//! shortcuts and recent browser history, and persists each as an append-only
//! record stream for later offline analysis.
//!
//! # Privacy Guarantees
//!
//! - **No keystroke content**: the keyboard hook only reports the C, V and
//!   modifier keys; every other key is dropped inside the OS callback
//! - **Local only**: records are written to local files and never sent anywhere
//! - **Consent switch**: collection can be paused and resumed at any time
//! - **Transparency**: every recorded item is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         CollectorController                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ┌───────────┐  ┌────────────┐  ┌───────────────┐  │
//! │  │  Window  │  │ Clipboard │  │ Copy/Paste │  │    Browser    │  │
//! │  │ Sampler  │  │  Sampler  │◀▶│  Listener  │  │ History Sampl.│  │
//! │  └────┬─────┘  └─────┬─────┘  └─────┬──────┘  └───────┬───────┘  │
//! │       │              │ dedup lock   │                 │          │
//! │       ▼              ▼              ▼                 ▼          │
//! │  windows.csv   clipboard.csv    events.csv   browser_history.csv │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use activity_collector::{create_shared_log, CollectorController, CollectorSources, Config};
//!
//! let config = Config::load().unwrap_or_default();
//! let mut controller =
//!     CollectorController::new(config, CollectorSources::system(), create_shared_log());
//!
//! controller.start().expect("Failed to start collector");
//! // ... later
//! let report = controller.stop();
//! println!("{} samplers stopped", report.joined.len());
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod controller;
pub mod history;
pub mod sampler;
pub mod sink;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use clock::{MonotonicClock, SharedClock};
pub use collector::{
    Browser, BrowserHistoryRow, ClipboardAccessor, ClipboardEntry, Event, EventKind, KeyHook,
    ListenerError, ObservationError, WindowContext, WindowInspector, WindowSnapshot,
};
pub use config::{Config, ConfigError, SourceConfig};
pub use controller::{
    CollectorController, CollectorSources, ControllerError, ControllerState, StopReport,
};
pub use history::{HistoryError, HistorySource, HistoryStoreReader, SqliteHistoryReader};
pub use sink::{RecordSink, SinkError, SinkFormat, Stream, StreamSet};
pub use transparency::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog,
    TransparencyLog, TransparencyStats,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             ACTIVITY COLLECTOR - PRIVACY DECLARATION             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This collector records desktop activity you have agreed to.     ║
║                                                                  ║
║  ✓ WHAT WE CAPTURE:                                              ║
║    • Which window is focused (title, process name)               ║
║    • Text you place on the clipboard                             ║
║    • That a copy or paste shortcut was used (not what you type)  ║
║    • Recently visited URLs from Chrome and Firefox history       ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Which keys you press (no passwords, messages, etc.)         ║
║    • Screen content or screenshots                               ║
║    • Anything from other users of this machine                   ║
║                                                                  ║
║  All records are written to local files only and are never      ║
║  transmitted. Pause at any time with:                            ║
║    activity-collector pause                                      ║
║                                                                  ║
║  You can view collection statistics anytime with:                ║
║    activity-collector status                                     ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER CAPTURE"));
        assert!(PRIVACY_DECLARATION.contains("keys you press"));
        assert!(PRIVACY_DECLARATION.contains("activity-collector pause"));
    }
}
