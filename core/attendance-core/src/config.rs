//! Configuration loading and saving.
//!
//! Every field has a serde default, so a partial or older config file still
//! loads. A missing or corrupt file yields [`CoreConfig::default`].

use std::io::Write;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use fs_err as fs;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::local_store::LocalStoreError;

/// When the working day starts and how attendance is graded against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftPolicy {
    #[serde(default = "default_shift_start")]
    pub shift_start: NaiveTime,
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: u32,
    /// Finalized days with fewer worked hours count as half days.
    #[serde(default = "default_half_day_hours")]
    pub half_day_hours: Decimal,
}

impl Default for ShiftPolicy {
    fn default() -> Self {
        ShiftPolicy {
            shift_start: default_shift_start(),
            grace_minutes: default_grace_minutes(),
            half_day_hours: default_half_day_hours(),
        }
    }
}

impl ShiftPolicy {
    /// Latest check-in that is not late for the shift starting on `date`.
    ///
    /// A grace window running past midnight ends on the following day.
    pub fn late_after(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.shift_start) + Duration::minutes(self.grace_minutes as i64)
    }

    pub fn is_late(&self, date: NaiveDate, check_in: NaiveDateTime) -> bool {
        check_in > self.late_after(date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Checking out while on break ends the break at checkout time.
    #[serde(default = "default_true")]
    pub close_open_break_on_checkout: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        SessionPolicy {
            close_open_break_on_checkout: true,
        }
    }
}

/// Retry policy for replaying queued approvals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    /// Refused attempts before an action is parked for the user.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            max_attempts: default_max_attempts(),
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl SyncPolicy {
    /// Delay before the next replay after `attempts` refused attempts.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::zero();
        }
        let exponent = attempts.saturating_sub(1).min(16);
        let secs = self
            .base_backoff_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_secs);
        Duration::seconds(secs as i64)
    }
}

/// Top-level configuration for an attendance client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    #[serde(default)]
    pub shift: ShiftPolicy,
    #[serde(default)]
    pub session: SessionPolicy,
    #[serde(default)]
    pub sync: SyncPolicy,
    /// Actors this client may summarize. Empty means no restriction.
    #[serde(default)]
    pub roster: Vec<String>,
}

impl CoreConfig {
    /// Loads the configuration, returning defaults if the file is missing or unreadable.
    pub fn load(path: &Path) -> CoreConfig {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return CoreConfig::default()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read config; using defaults");
                return CoreConfig::default();
            }
        };

        if content.trim().is_empty() {
            return CoreConfig::default();
        }

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Config file malformed; using defaults");
                CoreConfig::default()
            }
        }
    }

    /// Saves the configuration atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|source| CoreError::Json {
            context: "serialize config".to_string(),
            source,
        })?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| io_error("create config dir", source))?;

        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|source| io_error("create temp config", source))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|source| io_error("write temp config", source))?;
        temp_file
            .flush()
            .map_err(|source| io_error("flush temp config", source))?;
        temp_file
            .persist(path)
            .map_err(|err| io_error("persist config", err.error))?;
        Ok(())
    }

}

fn io_error(context: &str, source: std::io::Error) -> CoreError {
    CoreError::Storage(LocalStoreError::Io {
        context: context.to_string(),
        source,
    })
}

fn default_shift_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_grace_minutes() -> u32 {
    15
}

fn default_half_day_hours() -> Decimal {
    dec!(4)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_secs() -> u64 {
    30
}

fn default_max_backoff_secs() -> u64 {
    900
}
