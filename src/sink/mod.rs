//! Append-only record sinks.
//!
//! One [`RecordSink`] persists exactly one stream. Appends from any number of
//! threads are serialized by the sink's own mutex and each accepted record is
//! on disk before `append` returns. Sinks for different streams share nothing
//! and never block each other.
//!
//! Two encodings are supported:
//! - **csv**: a flat file with a fixed header written once, one row per record
//! - **json**: a single array of objects, rewritten in full on every append

pub mod csv;
pub mod json;

use crate::collector::types::{BrowserHistoryRow, ClipboardEntry, Event, WindowSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// The persisted record streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Windows,
    Clipboard,
    Events,
    BrowserHistory,
}

impl Stream {
    pub const ALL: [Stream; 4] = [
        Stream::Windows,
        Stream::Clipboard,
        Stream::Events,
        Stream::BrowserHistory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stream::Windows => "windows",
            Stream::Clipboard => "clipboard",
            Stream::Events => "events",
            Stream::BrowserHistory => "browser_history",
        }
    }

    /// Field names, in order. Used as the flat header and as the nested keys.
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Stream::Windows => &["timestamp", "title", "process", "pid"],
            Stream::Clipboard => &["timestamp", "content", "window_title", "process", "pid"],
            Stream::Events => &[
                "timestamp",
                "event_type",
                "window_title",
                "process",
                "pid",
                "associated_clipboard_timestamp",
            ],
            Stream::BrowserHistory => &[
                "timestamp",
                "browser",
                "url",
                "title",
                "visit_count",
                "last_visit_time",
            ],
        }
    }

    /// File name of this stream inside the output directory.
    pub fn file_name(&self, format: SinkFormat) -> String {
        format!("{}.{}", self.name(), format.extension())
    }
}

/// A record that belongs to exactly one stream.
pub trait Record: Serialize {
    const STREAM: Stream;

    fn timestamp(&self) -> DateTime<Utc>;

    /// Cells for the flat encoding, in [`Stream::header`] order.
    fn row(&self) -> Vec<String>;
}

/// On-disk encoding of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    #[default]
    Csv,
    Json,
}

impl SinkFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SinkFormat::Csv => "csv",
            SinkFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for SinkFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(SinkFormat::Csv),
            "json" => Ok(SinkFormat::Json),
            other => Err(format!("unknown format '{other}' (expected csv or json)")),
        }
    }
}

/// Errors raised while persisting a record.
#[derive(Debug)]
pub enum SinkError {
    Io(String),
    Serialize(String),
    /// Existing nested stream content could not be parsed; it is left untouched.
    Corrupt(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {e}"),
            SinkError::Serialize(e) => write!(f, "Serialize error: {e}"),
            SinkError::Corrupt(e) => write!(f, "Corrupt stream: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}

pub(crate) fn io_error(path: &Path, e: std::io::Error) -> SinkError {
    SinkError::Io(format!("{}: {e}", path.display()))
}

/// Thread-safe append-only persistence for the stream of `R`.
#[derive(Debug)]
pub struct RecordSink<R: Record> {
    path: PathBuf,
    format: SinkFormat,
    /// Serializes appends; holds the timestamp of the last accepted record
    last_appended: Mutex<Option<DateTime<Utc>>>,
    _record: PhantomData<fn(&R)>,
}

impl<R: Record> RecordSink<R> {
    /// Open the stream inside `dir`, creating it if it does not exist yet.
    pub fn open(dir: &Path, format: SinkFormat) -> Result<Self, SinkError> {
        Self::at_path(dir.join(R::STREAM.file_name(format)), format)
    }

    /// Open the stream at an explicit path.
    ///
    /// The header (or empty array) is written only when the file is missing
    /// or empty; existing content is never touched.
    pub fn at_path(path: PathBuf, format: SinkFormat) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }

        match format {
            SinkFormat::Csv => csv::initialize(&path, R::STREAM.header())?,
            SinkFormat::Json => json::initialize(&path)?,
        }

        Ok(Self {
            path,
            format,
            last_appended: Mutex::new(None),
            _record: PhantomData,
        })
    }

    /// Durably append one record.
    pub fn append(&self, record: &R) -> Result<(), SinkError> {
        let mut last = self
            .last_appended
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let timestamp = record.timestamp();
        if let Some(prev) = *last {
            if timestamp < prev {
                tracing::warn!(
                    stream = R::STREAM.name(),
                    %timestamp,
                    %prev,
                    "record is older than the last one appended"
                );
            }
        }

        match self.format {
            SinkFormat::Csv => csv::append_row(&self.path, &record.row())?,
            SinkFormat::Json => json::append_record(&self.path, record)?,
        }
        *last = Some(last.map_or(timestamp, |prev| prev.max(timestamp)));
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently persisted.
    pub fn len(&self) -> Result<usize, SinkError> {
        let _guard = self
            .last_appended
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        count_records(&self.path, self.format)
    }

    pub fn is_empty(&self) -> Result<bool, SinkError> {
        Ok(self.len()? == 0)
    }
}

/// Count the records of a stream file without opening a sink for it.
pub fn count_records(path: &Path, format: SinkFormat) -> Result<usize, SinkError> {
    if !path.exists() {
        return Ok(0);
    }
    match format {
        SinkFormat::Csv => Ok(csv::read_rows(path)?.len()),
        SinkFormat::Json => Ok(json::read_values(path)?.len()),
    }
}

/// Shared handle to a sink.
pub type SharedSink<R> = Arc<RecordSink<R>>;

/// The four sinks the collector writes to.
#[derive(Debug, Clone)]
pub struct StreamSet {
    pub windows: SharedSink<WindowSnapshot>,
    pub clipboard: SharedSink<ClipboardEntry>,
    pub events: SharedSink<Event>,
    pub browser_history: SharedSink<BrowserHistoryRow>,
}

impl StreamSet {
    /// Create (idempotently) every stream inside `dir`.
    pub fn open(dir: &Path, format: SinkFormat) -> Result<Self, SinkError> {
        Ok(Self {
            windows: Arc::new(RecordSink::open(dir, format)?),
            clipboard: Arc::new(RecordSink::open(dir, format)?),
            events: Arc::new(RecordSink::open(dir, format)?),
            browser_history: Arc::new(RecordSink::open(dir, format)?),
        })
    }
}
