//! Browser history database reading.
//!
//! The live database is never opened: it is copied into a private temporary
//! directory first, because the browser may hold a lock on it. The copy (and
//! the directory) are removed when the read finishes.

pub mod paths;
pub mod time;

use crate::collector::types::Browser;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use paths::default_sources;
pub use time::{chrome_time_to_iso, firefox_time_to_iso};

/// One place a history database may live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryCandidate {
    /// A fixed database path
    File { path: PathBuf },
    /// A directory of profiles, each possibly containing `file_name`
    Profiles { root: PathBuf, file_name: String },
}

impl HistoryCandidate {
    /// Concrete database paths, in the order they should be tried.
    pub fn expand(&self) -> Vec<PathBuf> {
        match self {
            HistoryCandidate::File { path } => vec![path.clone()],
            HistoryCandidate::Profiles { root, file_name } => {
                let mut profiles: Vec<PathBuf> = std::fs::read_dir(root)
                    .map(|entries| {
                        entries
                            .filter_map(|e| e.ok())
                            .map(|e| e.path())
                            .filter(|p| p.is_dir())
                            .collect()
                    })
                    .unwrap_or_default();
                profiles.sort();
                profiles.into_iter().map(|p| p.join(file_name)).collect()
            }
        }
    }
}

/// A browser family and its ordered candidate locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySource {
    pub browser: Browser,
    pub candidates: Vec<HistoryCandidate>,
}

impl HistorySource {
    /// The first candidate database that exists.
    pub fn locate(&self) -> Option<PathBuf> {
        self.candidates
            .iter()
            .flat_map(HistoryCandidate::expand)
            .find(|p| p.is_file())
    }
}

/// One visited URL, with the browser time already converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryVisit {
    pub url: String,
    pub title: String,
    pub visit_count: i64,
    pub last_visit_time: String,
}

/// Errors that make a browser's history unavailable for one tick.
#[derive(Debug)]
pub enum HistoryError {
    NotFound(Browser),
    Copy(String),
    Sqlite(String),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::NotFound(browser) => write!(f, "No {browser} history database found"),
            HistoryError::Copy(e) => write!(f, "Could not snapshot history database: {e}"),
            HistoryError::Sqlite(e) => write!(f, "Could not read history database: {e}"),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<rusqlite::Error> for HistoryError {
    fn from(e: rusqlite::Error) -> Self {
        HistoryError::Sqlite(e.to_string())
    }
}

/// One-shot reader of a browser's most recent visits.
pub trait HistoryStoreReader: Send + Sync {
    fn read_recent(
        &self,
        source: &HistorySource,
        limit: usize,
    ) -> Result<Vec<HistoryVisit>, HistoryError>;
}

/// Reads Chrome `History` and Firefox `places.sqlite` with SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteHistoryReader;

impl SqliteHistoryReader {
    pub fn new() -> Self {
        Self
    }

    /// Read from an explicit database path.
    pub fn read_database(
        &self,
        browser: Browser,
        database: &Path,
        limit: usize,
    ) -> Result<Vec<HistoryVisit>, HistoryError> {
        let snapshot = tempfile::Builder::new()
            .prefix("activity-collector-history-")
            .tempdir()
            .map_err(|e| HistoryError::Copy(e.to_string()))?;
        let copy = snapshot_database(database, snapshot.path())?;

        let conn = Connection::open(&copy)?;
        let visits = query_recent(&conn, browser, limit);
        drop(conn);

        // The directory and the copy go away with `snapshot`
        visits
    }
}

impl HistoryStoreReader for SqliteHistoryReader {
    fn read_recent(
        &self,
        source: &HistorySource,
        limit: usize,
    ) -> Result<Vec<HistoryVisit>, HistoryError> {
        let database = source
            .locate()
            .ok_or(HistoryError::NotFound(source.browser))?;
        self.read_database(source.browser, &database, limit)
    }
}

/// Copy the database (and its write-ahead log, if any) into `dir`.
fn snapshot_database(database: &Path, dir: &Path) -> Result<PathBuf, HistoryError> {
    let file_name = database
        .file_name()
        .ok_or_else(|| HistoryError::Copy(format!("{} has no file name", database.display())))?;
    let copy = dir.join(file_name);

    std::fs::copy(database, &copy)
        .map_err(|e| HistoryError::Copy(format!("{}: {e}", database.display())))?;

    let mut wal_name = file_name.to_os_string();
    wal_name.push("-wal");
    let wal = database.with_file_name(&wal_name);
    if wal.is_file() {
        // Recent visits may only exist in the WAL; a failed copy just loses those
        if let Err(e) = std::fs::copy(&wal, dir.join(&wal_name)) {
            tracing::debug!("could not copy {}: {e}", wal.display());
        }
    }

    Ok(copy)
}

fn query_recent(
    conn: &Connection,
    browser: Browser,
    limit: usize,
) -> Result<Vec<HistoryVisit>, HistoryError> {
    let sql = match browser {
        Browser::Chrome => {
            "SELECT url, title, visit_count, last_visit_time FROM urls \
             ORDER BY last_visit_time DESC LIMIT ?1"
        }
        Browser::Firefox => {
            "SELECT url, title, visit_count, last_visit_date FROM moz_places \
             ORDER BY last_visit_date DESC LIMIT ?1"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([limit as i64], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<i64>>(2)?,
            row.get::<_, Option<i64>>(3)?,
        ))
    })?;

    let mut visits = Vec::new();
    for row in rows {
        let (url, title, visit_count, raw_time) = row?;
        let last_visit_time = match browser {
            Browser::Chrome => raw_time.map(chrome_time_to_iso).unwrap_or_default(),
            Browser::Firefox => firefox_time_to_iso(raw_time),
        };
        visits.push(HistoryVisit {
            url,
            title: title.unwrap_or_default(),
            visit_count: visit_count.unwrap_or(0),
            last_visit_time,
        });
    }
    Ok(visits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrome_fixture(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT NOT NULL, title TEXT, \
                                visit_count INTEGER, last_visit_time INTEGER);
             INSERT INTO urls (url, title, visit_count, last_visit_time) VALUES
                ('https://old.example', 'Old', 1, 13300000000000),
                ('https://new.example', 'New', 5, 13350000000000000),
                ('https://never.example', NULL, 0, 0);",
        )
        .unwrap();
    }

    fn firefox_fixture(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT NOT NULL, title TEXT, \
                                      visit_count INTEGER, last_visit_date INTEGER);
             INSERT INTO moz_places (url, title, visit_count, last_visit_date) VALUES
                ('https://a.example', 'A', 2, 1700000000000000),
                ('https://b.example', NULL, 1, NULL);",
        )
        .unwrap();
    }

    #[test]
    fn test_chrome_rows_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        chrome_fixture(&db);

        let visits = SqliteHistoryReader::new()
            .read_database(Browser::Chrome, &db, 2)
            .unwrap();

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].url, "https://new.example");
        assert_eq!(visits[0].last_visit_time, "2024-01-17T21:20:00.000000Z");
        assert_eq!(visits[0].visit_count, 5);
        assert_eq!(visits[1].title, "Old");
    }

    #[test]
    fn test_firefox_null_values() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("abcd.default-release");
        std::fs::create_dir_all(&profile).unwrap();
        firefox_fixture(&profile.join("places.sqlite"));

        let source = HistorySource {
            browser: Browser::Firefox,
            candidates: vec![HistoryCandidate::Profiles {
                root: dir.path().to_path_buf(),
                file_name: "places.sqlite".to_string(),
            }],
        };
        let visits = SqliteHistoryReader::new().read_recent(&source, 50).unwrap();

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].last_visit_time, "2023-11-14T22:13:20.000000Z");
        assert_eq!(visits[1].title, "");
        assert_eq!(visits[1].last_visit_time, "");
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second").join("History");
        std::fs::create_dir_all(second.parent().unwrap()).unwrap();
        std::fs::write(&second, b"").unwrap();

        let source = HistorySource {
            browser: Browser::Chrome,
            candidates: vec![
                HistoryCandidate::File {
                    path: dir.path().join("missing").join("History"),
                },
                HistoryCandidate::File {
                    path: second.clone(),
                },
            ],
        };
        assert_eq!(source.locate(), Some(second));
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let source = HistorySource {
            browser: Browser::Chrome,
            candidates: vec![HistoryCandidate::File {
                path: PathBuf::from("/definitely/not/here/History"),
            }],
        };
        let err = SqliteHistoryReader::new().read_recent(&source, 10).unwrap_err();
        assert!(matches!(err, HistoryError::NotFound(Browser::Chrome)));
    }

    #[test]
    fn test_unreadable_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        std::fs::write(&db, b"this is not a sqlite database at all").unwrap();

        let err = SqliteHistoryReader::new()
            .read_database(Browser::Chrome, &db, 10)
            .unwrap_err();
        assert!(matches!(err, HistoryError::Sqlite(_)));
    }

    #[test]
    fn test_live_database_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("History");
        chrome_fixture(&db);
        let before = std::fs::read(&db).unwrap();

        SqliteHistoryReader::new()
            .read_database(Browser::Chrome, &db, 10)
            .unwrap();

        assert_eq!(std::fs::read(&db).unwrap(), before);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
