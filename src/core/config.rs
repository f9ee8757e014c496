//! Game Configuration
//!
//! Tunables for matchmaking liveness, turn budgets, grid size and the
//! transactional store.
//!
//! # Environment Variables
//!
//! - `GRID_ROWS`: rows of boxes (default: `3`)
//! - `GRID_COLS`: columns of boxes (default: `4`)
//! - `WAITING_TIME_THRESHOLD_MS`: matchmaking liveness window (default: `10000`)
//! - `PLAY_TIME_MS`: per-turn budget (default: `30000`)
//! - `MAX_TRANSACTION_ATTEMPTS`: optimistic commit attempts before a
//!   transient conflict is reported (default: `5`)
//! - `DEDUP_CAPACITY`: remembered command ids (default: `4096`)
//! - `INBOX_RETENTION`: newest notifications kept per player (default: `256`)

use thiserror::Error;

use crate::core::clock::Millis;
use crate::game::geometry::Grid;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Value could not be parsed.
    #[error("{var}: cannot parse {value:?}")]
    Unparsable {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// Value parsed but is outside its allowed range.
    #[error("{var}: {reason}")]
    OutOfRange {
        /// Variable name.
        var: &'static str,
        /// What was wrong.
        reason: &'static str,
    },
}

/// Server-wide game settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Rows of boxes (R).
    pub grid_rows: u32,
    /// Columns of boxes (C).
    pub grid_cols: u32,
    /// A waiting player must re-issue `match` within this window.
    pub waiting_time_threshold_ms: Millis,
    /// Per-turn budget before the opponent may claim a timeout.
    pub play_time_ms: Millis,
    /// Commit attempts per transaction.
    pub max_transaction_attempts: u32,
    /// Command ids remembered for deduplication.
    pub dedup_capacity: usize,
    /// Notifications kept per player inbox; older ones are dropped.
    pub inbox_retention: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_rows: 3,
            grid_cols: 4,
            waiting_time_threshold_ms: 10_000,
            play_time_ms: 30_000,
            max_transaction_attempts: 5,
            dedup_capacity: 4096,
            inbox_retention: 256,
        }
    }
}

impl GameConfig {
    /// Defaults overlaid with any environment variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            grid_rows: read_var(&lookup, "GRID_ROWS", defaults.grid_rows)?,
            grid_cols: read_var(&lookup, "GRID_COLS", defaults.grid_cols)?,
            waiting_time_threshold_ms: read_var(
                &lookup,
                "WAITING_TIME_THRESHOLD_MS",
                defaults.waiting_time_threshold_ms,
            )?,
            play_time_ms: read_var(&lookup, "PLAY_TIME_MS", defaults.play_time_ms)?,
            max_transaction_attempts: read_var(
                &lookup,
                "MAX_TRANSACTION_ATTEMPTS",
                defaults.max_transaction_attempts,
            )?,
            dedup_capacity: read_var(&lookup, "DEDUP_CAPACITY", defaults.dedup_capacity)?,
            inbox_retention: read_var(&lookup, "INBOX_RETENTION", defaults.inbox_retention)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_rows == 0 {
            return Err(ConfigError::OutOfRange { var: "GRID_ROWS", reason: "must be at least 1" });
        }
        if self.grid_cols == 0 {
            return Err(ConfigError::OutOfRange { var: "GRID_COLS", reason: "must be at least 1" });
        }
        if Grid::try_new(self.grid_rows, self.grid_cols).is_none() {
            return Err(ConfigError::OutOfRange {
                var: "GRID_ROWS",
                reason: "grid too large: line count overflows",
            });
        }
        if self.max_transaction_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                var: "MAX_TRANSACTION_ATTEMPTS",
                reason: "must be at least 1",
            });
        }
        if self.inbox_retention == 0 {
            return Err(ConfigError::OutOfRange { var: "INBOX_RETENTION", reason: "must be at least 1" });
        }
        Ok(())
    }

    /// Board geometry for these settings.
    pub fn grid(&self) -> Grid {
        Grid::new(self.grid_rows, self.grid_cols)
    }
}

pub(crate) fn read_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Unparsable { var, value: raw }),
        None => Ok(default),
    }
}
