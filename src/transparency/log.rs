//! Privacy-preserving transparency log.
//!
//! Counts what the collector recorded, per stream, without holding on to any
//! of the recorded content itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Collection statistics for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Window snapshots persisted
    windows_recorded: AtomicU64,
    /// Clipboard entries persisted
    clipboard_entries: AtomicU64,
    /// Copy events persisted
    copy_events: AtomicU64,
    /// Paste events persisted
    paste_events: AtomicU64,
    /// Browser history rows persisted
    history_rows: AtomicU64,
    /// Appends that failed
    persistence_failures: AtomicU64,
    session_id: Uuid,
    session_start: DateTime<Utc>,
    /// Totals of earlier sessions, loaded from disk
    previous: CollectionCounts,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            windows_recorded: AtomicU64::new(0),
            clipboard_entries: AtomicU64::new(0),
            copy_events: AtomicU64::new(0),
            paste_events: AtomicU64::new(0),
            history_rows: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            session_id: Uuid::new_v4(),
            session_start: Utc::now(),
            previous: CollectionCounts::default(),
            persist_path: None,
        }
    }

    /// Create a transparency log that accumulates into `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_window(&self) {
        self.windows_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clipboard_entry(&self) {
        self.clipboard_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_copy_event(&self) {
        self.copy_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_paste_event(&self) {
        self.paste_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_history_rows(&self, count: u64) {
        self.history_rows.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Counts for this session only.
    pub fn session_counts(&self) -> CollectionCounts {
        CollectionCounts {
            windows_recorded: self.windows_recorded.load(Ordering::Relaxed),
            clipboard_entries: self.clipboard_entries.load(Ordering::Relaxed),
            copy_events: self.copy_events.load(Ordering::Relaxed),
            paste_events: self.paste_events.load(Ordering::Relaxed),
            history_rows: self.history_rows.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        let session = self.session_counts();
        TransparencyStats {
            session_id: self.session_id,
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
            cumulative: self.previous.plus(&session),
            session,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let s = &stats.session;
        format!(
            "Session Statistics ({}):\n\
             - Window changes recorded: {}\n\
             - Clipboard entries recorded: {}\n\
             - Copy events recorded: {}\n\
             - Paste events recorded: {}\n\
             - Browser history rows recorded: {}\n\
             - Failed writes: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No keystroke content captured\n\
             - Only copy/paste shortcuts are detected\n\
             - All records stay on this machine",
            stats.session_id,
            s.windows_recorded,
            s.clipboard_entries,
            s.copy_events,
            s.paste_events,
            s.history_rows,
            s.persistence_failures,
            stats.session_duration_secs
        )
    }

    /// Save cumulative stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                totals: stats.cumulative,
                last_session_id: stats.session_id,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(persisted) = read_persisted(path)? {
                self.previous = persisted.totals;
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-stream record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub windows_recorded: u64,
    pub clipboard_entries: u64,
    pub copy_events: u64,
    pub paste_events: u64,
    pub history_rows: u64,
    pub persistence_failures: u64,
}

impl CollectionCounts {
    fn plus(&self, other: &CollectionCounts) -> CollectionCounts {
        CollectionCounts {
            windows_recorded: self.windows_recorded + other.windows_recorded,
            clipboard_entries: self.clipboard_entries + other.clipboard_entries,
            copy_events: self.copy_events + other.copy_events,
            paste_events: self.paste_events + other.paste_events,
            history_rows: self.history_rows + other.history_rows,
            persistence_failures: self.persistence_failures + other.persistence_failures,
        }
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub session_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
    pub session: CollectionCounts,
    /// Earlier sessions plus this one
    pub cumulative: CollectionCounts,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub totals: CollectionCounts,
    pub last_session_id: Uuid,
    pub last_updated: DateTime<Utc>,
}

/// Read stats persisted by an earlier session, if any.
pub fn read_persisted(path: &std::path::Path) -> Result<Option<PersistedStats>, std::io::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let persisted = serde_json::from_str(&content).map_err(std::io::Error::other)?;
    Ok(Some(persisted))
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
