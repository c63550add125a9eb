//! Browser history sampler.

use crate::clock::SharedClock;
use crate::collector::types::BrowserHistoryRow;
use crate::history::{HistorySource, HistoryStoreReader};
use crate::sampler::{persist, run_every, RunFlags};
use crate::sink::SharedSink;
use crate::transparency::SharedTransparencyLog;
use std::sync::Arc;
use std::time::Duration;

/// Periodically copies the most recent visits of each known browser.
///
/// Rows are not de-duplicated across ticks: every tick is a fresh sample of
/// the newest `limit` visits, stamped with the sample time.
pub struct BrowserHistorySampler {
    reader: Arc<dyn HistoryStoreReader>,
    sources: Vec<HistorySource>,
    limit: usize,
    sink: SharedSink<BrowserHistoryRow>,
    clock: SharedClock,
    log: SharedTransparencyLog,
}

impl BrowserHistorySampler {
    pub fn new(
        reader: Arc<dyn HistoryStoreReader>,
        sources: Vec<HistorySource>,
        limit: usize,
        sink: SharedSink<BrowserHistoryRow>,
        clock: SharedClock,
        log: SharedTransparencyLog,
    ) -> Self {
        Self {
            reader,
            sources,
            limit,
            sink,
            clock,
            log,
        }
    }

    /// Sample every browser once. Returns the number of rows persisted.
    pub fn tick(&self) -> usize {
        let mut written = 0;

        for source in &self.sources {
            let visits = match self.reader.read_recent(source, self.limit) {
                Ok(visits) => visits,
                Err(e) => {
                    tracing::warn!(browser = %source.browser, "history unavailable: {e}");
                    continue;
                }
            };

            let sampled_at = self.clock.now();
            let mut rows = 0;
            for visit in visits {
                let row = BrowserHistoryRow {
                    timestamp: sampled_at,
                    browser: source.browser,
                    url: visit.url,
                    title: visit.title,
                    visit_count: visit.visit_count,
                    last_visit_time: visit.last_visit_time,
                };
                if persist(&self.sink, &row, &self.log) {
                    rows += 1;
                }
            }

            tracing::info!(stream = "browser", "{}: {rows} rows", source.browser);
            self.log.record_history_rows(rows as u64);
            written += rows;
        }

        written
    }

    /// Sample every `interval` until shutdown.
    pub fn run(self, interval: Duration, flags: RunFlags) {
        tracing::debug!(
            "history sampler started ({interval:?}, {} browsers)",
            self.sources.len()
        );
        run_every(interval, &flags, || {
            self.tick();
        });
        tracing::debug!("history sampler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::collector::types::Browser;
    use crate::history::{HistoryError, HistoryVisit};
    use crate::sink::{RecordSink, SinkFormat};
    use crate::transparency::create_shared_log;

    struct OnlyFirefox;

    impl HistoryStoreReader for OnlyFirefox {
        fn read_recent(
            &self,
            source: &HistorySource,
            limit: usize,
        ) -> Result<Vec<HistoryVisit>, HistoryError> {
            match source.browser {
                Browser::Chrome => Err(HistoryError::NotFound(Browser::Chrome)),
                Browser::Firefox => Ok((0..limit.min(3))
                    .map(|i| HistoryVisit {
                        url: format!("https://site{i}.example"),
                        title: format!("Site {i}"),
                        visit_count: i as i64,
                        last_visit_time: String::new(),
                    })
                    .collect()),
            }
        }
    }

    fn source(browser: Browser) -> HistorySource {
        HistorySource {
            browser,
            candidates: Vec::new(),
        }
    }

    #[test]
    fn test_unavailable_browser_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordSink::open(dir.path(), SinkFormat::Csv).unwrap());
        let log = create_shared_log();
        let sampler = BrowserHistorySampler::new(
            Arc::new(OnlyFirefox),
            vec![source(Browser::Chrome), source(Browser::Firefox)],
            50,
            sink.clone(),
            Arc::new(MonotonicClock::new()),
            log.clone(),
        );

        assert_eq!(sampler.tick(), 3);
        assert_eq!(sampler.tick(), 3);
        assert_eq!(sink.len().unwrap(), 6);
        assert_eq!(log.session_counts().history_rows, 6);

        let rows = crate::sink::csv::read_rows(sink.path()).unwrap();
        assert!(rows.iter().all(|row| row[1] == "firefox"));
        assert_eq!(rows[0][0], rows[2][0]);
    }

    #[test]
    fn test_limit_is_passed_to_reader() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordSink::open(dir.path(), SinkFormat::Json).unwrap());
        let sampler = BrowserHistorySampler::new(
            Arc::new(OnlyFirefox),
            vec![source(Browser::Firefox)],
            1,
            sink,
            Arc::new(MonotonicClock::new()),
            create_shared_log(),
        );

        assert_eq!(sampler.tick(), 1);
    }
}
