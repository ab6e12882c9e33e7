//! `warehouse-core` — ledger foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog, order
//! and alert crates (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{LedgerError, LedgerResult, RecordKind};
pub use id::{FulfillmentLogId, OrderId, OrderItemId, PartId, ProjectId, StockAlertId};
pub use value_object::{OrNumber, Quantity, ValueObject};
