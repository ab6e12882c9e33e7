//! Part catalog and stock ledger primitives.
//!
//! This crate contains the business rules for on-hand stock, implemented
//! purely as deterministic domain logic (no IO, no locking, no storage).
//! Callers compose these primitives inside an atomic unit of work.

pub mod part;

pub use part::{ClassifyPart, Part, RegisterPart, Rotation, StockAdjustment, StockMovement};
