//! Usage ledger: daily and continuous usage accumulation.
//!
//! The ledger is wall-clock-based and caller-driven -- it does not own a
//! timer. The service layer calls `tick()` on a fixed interval and the
//! ledger credits the whole seconds elapsed since the previous poll to
//! both counters. The daily total survives restarts for the same calendar
//! date through a small JSON snapshot; the continuous total never does.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PersistenceError;

/// Durable form of the daily counter, one JSON object on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStats {
    pub today_date: NaiveDate,
    pub daily_usage_time: u64,
}

/// Point-in-time view of the ledger counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub date: NaiveDate,
    pub daily_usage_secs: u64,
    pub continuous_usage_secs: u64,
    pub last_poll: DateTime<Local>,
}

/// Tracks elapsed active seconds since the last poll.
///
/// Both counters are monotonically non-decreasing between resets: the
/// daily total resets on date rollover, the continuous total on load and
/// whenever forced rest begins.
pub struct UsageLedger {
    today: NaiveDate,
    daily_secs: u64,
    continuous_secs: u64,
    last_poll: DateTime<Local>,
    running: bool,
    stats_path: PathBuf,
}

impl UsageLedger {
    /// Restore the ledger from the snapshot at `stats_path`.
    ///
    /// The persisted daily total is adopted only when its date equals the
    /// current calendar date; anything else (missing file, unreadable or
    /// corrupt content, different date) starts the day at zero. Continuous
    /// usage always starts at zero. Never fails the caller.
    pub fn load(stats_path: PathBuf, now: DateTime<Local>) -> Self {
        let today = now.date_naive();
        let daily_secs = match load_persisted(&stats_path) {
            Ok(Some(stats)) if stats.today_date == today => {
                info!(daily_secs = stats.daily_usage_time, "restored daily usage for today");
                stats.daily_usage_time
            }
            Ok(Some(stats)) => {
                info!(stored_date = %stats.today_date, "new day, daily usage reset to zero");
                0
            }
            Ok(None) => {
                info!("no usage snapshot found, daily usage starts at zero");
                0
            }
            Err(e) => {
                warn!(error = %e, "unreadable usage snapshot, starting fresh");
                0
            }
        };
        Self {
            today,
            daily_secs,
            continuous_secs: 0,
            last_poll: now,
            running: true,
            stats_path,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn daily_usage_secs(&self) -> u64 {
        self.daily_secs
    }

    pub fn continuous_usage_secs(&self) -> u64 {
        self.continuous_secs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            date: self.today,
            daily_usage_secs: self.daily_secs,
            continuous_usage_secs: self.continuous_secs,
            last_poll: self.last_poll,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Credit the seconds elapsed since the previous poll to both counters.
    ///
    /// The recorded instant always advances, even while stopped, so that
    /// resuming never produces a burst add for the stopped span. A `now`
    /// on a later calendar date rolls the daily counter over to zero first.
    pub fn tick(&mut self, now: DateTime<Local>) {
        let elapsed = (now - self.last_poll).num_seconds().max(0) as u64;
        self.last_poll = now;
        if !self.running {
            return;
        }

        let today = now.date_naive();
        if today != self.today {
            info!(%today, "date rollover, daily usage reset to zero");
            self.today = today;
            self.daily_secs = 0;
        }

        self.daily_secs += elapsed;
        self.continuous_secs += elapsed;
        debug!(
            elapsed,
            daily_secs = self.daily_secs,
            continuous_secs = self.continuous_secs,
            "usage tick"
        );
    }

    /// Zero the continuous counter; called when forced rest begins.
    pub fn reset_continuous(&mut self) {
        self.continuous_secs = 0;
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Write the current date and daily total to the snapshot file,
    /// creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Reports write failures for the caller to log; never fatal.
    pub fn persist(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.stats_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::WriteFailed {
                path: self.stats_path.clone(),
                source: e,
            })?;
        }
        let stats = PersistedStats {
            today_date: self.today,
            daily_usage_time: self.daily_secs,
        };
        let json = serde_json::to_string(&stats).map_err(|e| PersistenceError::ParseFailed {
            path: self.stats_path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.stats_path, json).map_err(|e| PersistenceError::WriteFailed {
            path: self.stats_path.clone(),
            source: e,
        })
    }
}

/// Read a persisted snapshot, `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns an error for unreadable or unparseable content.
pub fn load_persisted(path: &Path) -> Result<Option<PersistedStats>, PersistenceError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PersistenceError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let stats = serde_json::from_str(&content).map_err(|e| PersistenceError::ParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Some(stats))
}

/// Format seconds as `HH:MM:SS`.
pub fn format_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn temp_stats_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("usage_stats.json")
    }

    #[test]
    fn monotonic_ticks_accumulate_both_counters() {
        let dir = tempfile::tempdir().unwrap();
        let start = local(2024, 3, 1, 10, 0, 0);
        let mut ledger = UsageLedger::load(temp_stats_path(&dir), start);

        for i in 1..=30 {
            ledger.tick(start + Duration::seconds(i));
        }
        assert_eq!(ledger.daily_usage_secs(), 30);
        assert_eq!(ledger.continuous_usage_secs(), 30);
    }

    #[test]
    fn stopped_ledger_advances_instant_without_crediting() {
        let dir = tempfile::tempdir().unwrap();
        let start = local(2024, 3, 1, 10, 0, 0);
        let mut ledger = UsageLedger::load(temp_stats_path(&dir), start);

        ledger.tick(start + Duration::seconds(5));
        ledger.stop();
        ledger.tick(start + Duration::seconds(65));
        ledger.start();
        // No burst add for the stopped minute.
        ledger.tick(start + Duration::seconds(66));
        assert_eq!(ledger.daily_usage_secs(), 6);
    }

    #[test]
    fn reset_continuous_leaves_daily_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let start = local(2024, 3, 1, 10, 0, 0);
        let mut ledger = UsageLedger::load(temp_stats_path(&dir), start);

        ledger.tick(start + Duration::seconds(601));
        ledger.reset_continuous();
        assert_eq!(ledger.continuous_usage_secs(), 0);
        assert_eq!(ledger.daily_usage_secs(), 601);
    }

    #[test]
    fn same_day_snapshot_restores_daily_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_stats_path(&dir);
        let start = local(2024, 3, 1, 10, 0, 0);

        let mut ledger = UsageLedger::load(path.clone(), start);
        ledger.tick(start + Duration::seconds(12345));
        ledger.persist().unwrap();

        let restored = UsageLedger::load(path, start + Duration::hours(1));
        assert_eq!(restored.daily_usage_secs(), 12345);
        assert_eq!(restored.continuous_usage_secs(), 0);
    }

    #[test]
    fn day_rollover_discards_yesterdays_total() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_stats_path(&dir);
        let yesterday = local(2024, 3, 1, 23, 0, 0);

        let mut ledger = UsageLedger::load(path.clone(), yesterday);
        ledger.tick(yesterday + Duration::seconds(5000));
        ledger.persist().unwrap();

        let restored = UsageLedger::load(path, local(2024, 3, 2, 9, 0, 0));
        assert_eq!(restored.daily_usage_secs(), 0);
    }

    #[test]
    fn rollover_during_tick_resets_daily_not_continuous() {
        let dir = tempfile::tempdir().unwrap();
        let start = local(2024, 3, 1, 23, 59, 30);
        let mut ledger = UsageLedger::load(temp_stats_path(&dir), start);

        ledger.tick(start + Duration::seconds(20));
        assert_eq!(ledger.daily_usage_secs(), 20);

        ledger.tick(local(2024, 3, 2, 0, 0, 10));
        assert_eq!(ledger.daily_usage_secs(), 20);
        assert_eq!(ledger.continuous_usage_secs(), 40);
        assert_eq!(ledger.snapshot().date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn persist_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_stats_path(&dir);
        let start = local(2024, 3, 1, 10, 0, 0);

        let mut ledger = UsageLedger::load(path.clone(), start);
        ledger.tick(start + Duration::seconds(4321));
        ledger.persist().unwrap();

        let stats = load_persisted(&path).unwrap().unwrap();
        assert_eq!(stats.daily_usage_time, 4321);
        assert_eq!(stats.today_date, start.date_naive());
    }

    #[test]
    fn persist_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("usage_stats.json");
        let ledger = UsageLedger::load(path.clone(), local(2024, 3, 1, 10, 0, 0));
        ledger.persist().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn corrupt_snapshot_degrades_to_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_stats_path(&dir);
        std::fs::write(&path, "{ not json").unwrap();

        let ledger = UsageLedger::load(path, local(2024, 3, 1, 10, 0, 0));
        assert_eq!(ledger.daily_usage_secs(), 0);
        assert_eq!(ledger.continuous_usage_secs(), 0);
    }

    #[test]
    fn backwards_clock_jump_credits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let start = local(2024, 3, 1, 10, 0, 0);
        let mut ledger = UsageLedger::load(temp_stats_path(&dir), start);

        ledger.tick(start - Duration::seconds(30));
        assert_eq!(ledger.daily_usage_secs(), 0);
        // The instant moved back with the clock; forward progress resumes.
        ledger.tick(start - Duration::seconds(20));
        assert_eq!(ledger.daily_usage_secs(), 10);
    }

    #[test]
    fn snapshot_json_uses_stable_keys() {
        let stats = PersistedStats {
            today_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            daily_usage_time: 42,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(json, r#"{"today_date":"2024-03-01","daily_usage_time":42}"#);
    }

    #[test]
    fn format_hms_pads_fields() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(61), "00:01:01");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(360000), "100:00:00");
    }
}
