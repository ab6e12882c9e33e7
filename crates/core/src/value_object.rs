//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A strictly positive unit count moved by a ledger operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(units: u32) -> LedgerResult<Self> {
        if units == 0 {
            return Err(LedgerError::validation("quantity must be positive"));
        }
        Ok(Self(units))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Signed form, as written to the fulfillment log.
    pub fn signed(self) -> i64 {
        i64::from(self.0)
    }
}

impl ValueObject for Quantity {}

impl TryFrom<u32> for Quantity {
    type Error = LedgerError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Human-facing order reference number, e.g. `OR-2024-001`.
///
/// Comparison against user-entered references is case-insensitive; see
/// [`OrNumber::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrNumber(String);

impl OrNumber {
    /// Wrap an existing reference (e.g. loaded from storage).
    pub fn new(value: impl Into<String>) -> LedgerResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::validation("order number cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build `PREFIX-YYYY-NNN` with the sequence zero-padded to `width` digits.
    pub fn compose(prefix: &str, year: i32, sequence: u32, width: usize) -> Self {
        Self(format!("{prefix}-{year:04}-{sequence:0width$}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive exact match against a user-entered reference.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.eq_ignore_ascii_case(candidate.trim())
    }
}

impl ValueObject for OrNumber {}

impl core::fmt::Display for OrNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
