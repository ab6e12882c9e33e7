//! Ledger error model.

use thiserror::Error;

use crate::id::{OrderId, PartId};

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Kind of record a lookup was aimed at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Part,
    Order,
    OrderItem,
    StockAlert,
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            RecordKind::Part => "part",
            RecordKind::Order => "order",
            RecordKind::OrderItem => "order item",
            RecordKind::StockAlert => "stock alert",
        };
        f.write_str(name)
    }
}

/// Ledger-level error.
///
/// Business-rule rejections (`InsufficientStock`, `OverRemoval`,
/// `InvalidTransition`, `OrderClosed`) are returned before any write happens.
/// `TransientFailure` is the only retryable class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A value failed validation (e.g. non-positive quantity, empty SKU).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A standalone lookup missed.
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// A compound operation referenced a part that does not exist.
    #[error("part not found: {0}")]
    PartNotFound(PartId),

    /// A compound operation referenced an order that does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("insufficient stock for part {part_id}: requested {requested}, available {available}")]
    InsufficientStock {
        part_id: PartId,
        requested: u32,
        available: u32,
    },

    #[error("cannot remove {requested} of part {part_id}: only {fulfilled} delivered")]
    OverRemoval {
        part_id: PartId,
        requested: u32,
        fulfilled: u32,
    },

    /// A lifecycle transition is not allowed from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("order {0} is closed")]
    OrderClosed(OrderId),

    /// Contention or timeout on the atomic unit of work. Safe to retry.
    #[error("transient failure: {0}")]
    TransientFailure(String),

    /// Non-retryable storage fault.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: RecordKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientFailure(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }

    /// Whether this is a business-rule rejection rather than a fault.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock { .. }
                | Self::OverRemoval { .. }
                | Self::InvalidTransition(_)
                | Self::OrderClosed(_)
        )
    }
}
