//! Ledger configuration.
//!
//! Values come from `WAREHOUSE_*` environment variables or a JSON document.
//! Unset or unparsable variables fall back to defaults with a warning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use warehouse_core::{LedgerError, LedgerResult};
use warehouse_orders::OrderNumbering;

pub const ENV_OR_PREFIX: &str = "WAREHOUSE_OR_PREFIX";
pub const ENV_SEQUENCE_WIDTH: &str = "WAREHOUSE_SEQUENCE_WIDTH";
pub const ENV_LOCK_TIMEOUT_MS: &str = "WAREHOUSE_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// OR-number prefix, e.g. `OR` in `OR-2024-001`.
    pub or_prefix: String,
    /// Minimum digits of the zero-padded sequence.
    pub sequence_width: usize,
    /// Longest a unit of work waits for its locks before failing transiently.
    pub lock_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            or_prefix: "OR".to_string(),
            sequence_width: 3,
            lock_timeout_ms: 2_000,
        }
    }
}

impl LedgerConfig {
    /// Read from the process environment.
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary key lookup (tests, layered sources).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LedgerResult<Self> {
        let defaults = Self::default();

        let or_prefix = lookup(ENV_OR_PREFIX).unwrap_or_else(|| defaults.or_prefix.clone());
        let sequence_width = parse_or_default(&lookup, ENV_SEQUENCE_WIDTH, defaults.sequence_width);
        let lock_timeout_ms = parse_or_default(&lookup, ENV_LOCK_TIMEOUT_MS, defaults.lock_timeout_ms);

        let config = Self {
            or_prefix,
            sequence_width,
            lock_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> LedgerResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| LedgerError::validation(format!("invalid ledger config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        self.numbering().map(|_| ())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn numbering(&self) -> LedgerResult<OrderNumbering> {
        OrderNumbering::new(self.or_prefix.as_str(), self.sequence_width)
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + core::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, %default, "unparsable config value; using default");
                default
            }
        },
    }
}
