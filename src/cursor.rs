use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{PipelineError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct CursorRecord {
    last_fetched_at: DateTime<Utc>,
}

/// Persisted "last successful fetch" timestamp. Read at the start of a
/// run, advanced only after the whole run commits; a failed run leaves
/// it untouched so the next run re-covers the same window.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The stored cursor, or `None` on first run. An unreadable or
    /// malformed file degrades to "no prior fetch" rather than aborting
    /// the run.
    pub fn load(&self) -> Option<DateTime<Utc>> {
        if !self.path.exists() {
            return None;
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read fetch cursor, treating as first run: {}", e);
                return None;
            }
        };
        match serde_json::from_str::<CursorRecord>(&raw) {
            Ok(record) => Some(record.last_fetched_at),
            Err(e) => {
                warn!("Fetch cursor is corrupted, treating as first run: {}", e);
                None
            }
        }
    }

    /// Default lower bound for a first run: the start of yesterday, so
    /// an initial fetch is bounded instead of backfilling entire feed
    /// histories.
    pub fn default_since(now: DateTime<Utc>) -> DateTime<Utc> {
        let yesterday = now.date_naive() - Duration::days(1);
        yesterday.and_time(NaiveTime::MIN).and_utc()
    }

    /// Advance the cursor, atomically and monotonically: the file is
    /// replaced via a sibling tmp file and rename, and a timestamp
    /// older than the stored one is ignored.
    pub fn advance(&self, fetched_at: DateTime<Utc>) -> Result<()> {
        if let Some(current) = self.load() {
            if fetched_at <= current {
                debug!(
                    "Cursor already at {}, not regressing to {}",
                    current, fetched_at
                );
                return Ok(());
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = CursorRecord { last_fetched_at: fetched_at };
        let raw = serde_json::to_string_pretty(&record)
            .map_err(|e| PipelineError::StateCorruption(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Fetch cursor advanced to {}", fetched_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store(dir: &tempfile::TempDir) -> CursorStore {
        CursorStore::new(dir.path().join("last_fetch.json"))
    }

    #[test]
    fn missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(&dir).load().is_none());
    }

    #[test]
    fn advance_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let ts = Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap();
        store.advance(ts).unwrap();
        assert_eq!(store.load(), Some(ts));
    }

    #[test]
    fn corrupted_file_degrades_to_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::write(dir.path().join("last_fetch.json"), "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn cursor_never_regresses() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let newer = Utc.with_ymd_and_hms(2026, 8, 24, 20, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2026, 8, 24, 8, 0, 0).unwrap();
        store.advance(newer).unwrap();
        store.advance(older).unwrap();
        assert_eq!(store.load(), Some(newer));
    }

    #[test]
    fn default_since_is_start_of_yesterday() {
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 9, 30, 0).unwrap();
        let since = CursorStore::default_since(now);
        assert_eq!(since, Utc.with_ymd_and_hms(2026, 8, 23, 0, 0, 0).unwrap());
    }
}
