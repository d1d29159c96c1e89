//! TOML-based application configuration.
//!
//! Stores the rest-enforcement thresholds:
//! - Master on/off switch for the scheduler
//! - First-reminder and forced-shutdown hours
//! - Planned shutdown time and countdown delay
//! - Continuous-usage threshold and forced-rest duration
//! - Persistence interval for the usage snapshot
//!
//! Configuration is stored at `~/.config/restwarden/config.toml` and is
//! read once at startup; a reload requires restarting the scheduler.
//!
//! Loading is lenient per key: a missing or malformed value falls back to
//! its default with a logged warning and never fails the caller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.toml";

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/restwarden/config.toml`. Minute-
/// valued keys mirror the config file; the scheduler consumes them through
/// the `*_secs` accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub enable_rest_reminder: bool,
    /// Hour (0-23) from which general reminders start firing.
    #[serde(default = "default_first_reminder_hour")]
    pub first_reminder_hour: u32,
    /// Planned-shutdown time of day.
    #[serde(default = "default_shutdown_plan_hour")]
    pub shutdown_plan_hour: u32,
    #[serde(default = "default_shutdown_plan_minute")]
    pub shutdown_plan_minute: u32,
    /// Countdown length before the planned shutdown executes.
    #[serde(default = "default_shutdown_delay_minutes")]
    pub shutdown_delay_minutes: u64,
    /// Minimum seconds between two general reminders.
    #[serde(default = "default_reminder_interval_seconds")]
    pub reminder_interval_seconds: u64,
    /// Continuous usage (minutes) after which rest is forced.
    #[serde(default = "default_continuous_usage_threshold_minutes")]
    pub continuous_usage_threshold_minutes: u64,
    /// Length of a forced-rest interlude in minutes.
    #[serde(default = "default_forced_rest_duration_minutes")]
    pub forced_rest_duration_minutes: u64,
    /// Hour (0-23) of the unconditional shutdown.
    #[serde(default = "default_forced_shutdown_hour")]
    pub forced_shutdown_hour: u32,
    #[serde(default = "default_save_stats_interval_seconds")]
    pub save_stats_interval_seconds: u64,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_first_reminder_hour() -> u32 {
    21
}
fn default_shutdown_plan_hour() -> u32 {
    21
}
fn default_shutdown_plan_minute() -> u32 {
    30
}
fn default_shutdown_delay_minutes() -> u64 {
    5
}
fn default_reminder_interval_seconds() -> u64 {
    300
}
fn default_continuous_usage_threshold_minutes() -> u64 {
    10
}
fn default_forced_rest_duration_minutes() -> u64 {
    1
}
fn default_forced_shutdown_hour() -> u32 {
    22
}
fn default_save_stats_interval_seconds() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_rest_reminder: default_true(),
            first_reminder_hour: default_first_reminder_hour(),
            shutdown_plan_hour: default_shutdown_plan_hour(),
            shutdown_plan_minute: default_shutdown_plan_minute(),
            shutdown_delay_minutes: default_shutdown_delay_minutes(),
            reminder_interval_seconds: default_reminder_interval_seconds(),
            continuous_usage_threshold_minutes: default_continuous_usage_threshold_minutes(),
            forced_rest_duration_minutes: default_forced_rest_duration_minutes(),
            forced_shutdown_hour: default_forced_shutdown_hour(),
            save_stats_interval_seconds: default_save_stats_interval_seconds(),
        }
    }
}

impl Config {
    fn path() -> std::io::Result<PathBuf> {
        Ok(super::data_dir()?.join(CONFIG_FILE))
    }

    /// Load from disk, or return defaults.
    ///
    /// A missing file is created with defaults. Any unreadable file, invalid
    /// TOML, or per-key type/range problem degrades to the default value
    /// with a logged warning; this never fails the caller.
    pub fn load() -> Self {
        let path = match Self::path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "config directory unavailable, using defaults");
                return Self::default();
            }
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_lenient(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                if let Err(e) = cfg.save() {
                    warn!(error = %e, "could not write default config");
                }
                cfg
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "could not read config, using defaults");
                Self::default()
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path().map_err(|e| ConfigError::SaveFailed {
            path: PathBuf::from(CONFIG_FILE),
            message: e.to_string(),
        })?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Parse TOML content key by key, falling back per key on bad values.
    fn from_toml_lenient(content: &str) -> Self {
        let table = match content.parse::<toml::Table>() {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "config file is not valid TOML, using defaults");
                return Self::default();
            }
        };

        let mut cfg = Self::default();
        read_bool(&table, "enable_rest_reminder", &mut cfg.enable_rest_reminder);
        read_hour(&table, "first_reminder_hour", &mut cfg.first_reminder_hour);
        read_hour(&table, "shutdown_plan_hour", &mut cfg.shutdown_plan_hour);
        read_minute(&table, "shutdown_plan_minute", &mut cfg.shutdown_plan_minute);
        read_u64(&table, "shutdown_delay_minutes", &mut cfg.shutdown_delay_minutes);
        read_u64(
            &table,
            "reminder_interval_seconds",
            &mut cfg.reminder_interval_seconds,
        );
        read_u64(
            &table,
            "continuous_usage_threshold_minutes",
            &mut cfg.continuous_usage_threshold_minutes,
        );
        read_u64(
            &table,
            "forced_rest_duration_minutes",
            &mut cfg.forced_rest_duration_minutes,
        );
        read_hour(&table, "forced_shutdown_hour", &mut cfg.forced_shutdown_hour);
        read_u64(
            &table,
            "save_stats_interval_seconds",
            &mut cfg.save_stats_interval_seconds,
        );
        cfg
    }

    // ── Derived values ───────────────────────────────────────────────

    pub fn shutdown_delay_secs(&self) -> u64 {
        self.shutdown_delay_minutes.saturating_mul(60)
    }

    pub fn continuous_usage_threshold_secs(&self) -> u64 {
        self.continuous_usage_threshold_minutes.saturating_mul(60)
    }

    pub fn forced_rest_duration_secs(&self) -> u64 {
        self.forced_rest_duration_minutes.saturating_mul(60)
    }

    // ── Key access for the CLI ───────────────────────────────────────

    /// Get a config value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = json.get(key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and save. The new value must parse as the
    /// key's existing type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let existing = obj
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => {
                let parsed = value.parse::<bool>().map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
                serde_json::Value::Bool(parsed)
            }
            serde_json::Value::Number(_) => {
                let parsed = value.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
                serde_json::Value::Number(parsed.into())
            }
            _ => serde_json::Value::String(value.to_string()),
        };
        obj.insert(key.to_string(), new_value);

        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.save()
    }
}

fn read_bool(table: &toml::Table, key: &str, slot: &mut bool) {
    match table.get(key) {
        None => {}
        Some(toml::Value::Boolean(b)) => *slot = *b,
        Some(other) => warn!(key, value = %other, "config value is not a boolean, keeping default"),
    }
}

fn read_u64(table: &toml::Table, key: &str, slot: &mut u64) {
    match table.get(key) {
        None => {}
        Some(toml::Value::Integer(i)) if *i >= 0 => *slot = *i as u64,
        Some(other) => {
            warn!(key, value = %other, "config value is not a non-negative integer, keeping default")
        }
    }
}

fn read_bounded(table: &toml::Table, key: &str, slot: &mut u32, max: i64) {
    match table.get(key) {
        None => {}
        Some(toml::Value::Integer(i)) if (0..=max).contains(i) => *slot = *i as u32,
        Some(other) => {
            warn!(key, value = %other, max, "config value is out of range, keeping default")
        }
    }
}

fn read_hour(table: &toml::Table, key: &str, slot: &mut u32) {
    read_bounded(table, key, slot, 23);
}

fn read_minute(table: &toml::Table, key: &str, slot: &mut u32) {
    read_bounded(table, key, slot, 59);
}
