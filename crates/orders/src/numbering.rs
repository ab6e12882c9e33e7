use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{LedgerError, LedgerResult, OrNumber};

/// OR-number scheme: `PREFIX-YYYY-NNN`, one sequence per (prefix, year).
///
/// This type only formats; allocating the next sequence value is the job of
/// the store, inside the same unit of work that inserts the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNumbering {
    prefix: String,
    width: usize,
}

impl OrderNumbering {
    pub fn new(prefix: impl Into<String>, width: usize) -> LedgerResult<Self> {
        let prefix = prefix.into().trim().to_string();
        if prefix.is_empty() {
            return Err(LedgerError::validation("order number prefix cannot be empty"));
        }
        if width == 0 {
            return Err(LedgerError::validation("order number width must be positive"));
        }
        Ok(Self { prefix, width })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Numbering period an order created at `at` belongs to.
    pub fn period(&self, at: DateTime<Utc>) -> i32 {
        at.year()
    }

    pub fn compose(&self, period: i32, sequence: u32) -> OrNumber {
        OrNumber::compose(&self.prefix, period, sequence, self.width)
    }
}

impl Default for OrderNumbering {
    fn default() -> Self {
        Self {
            prefix: "OR".to_string(),
            width: 3,
        }
    }
}
