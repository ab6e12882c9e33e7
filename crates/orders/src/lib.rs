//! Work orders, their per-part lines, and the fulfillment audit trail.
//!
//! This crate contains business rules for orders implemented purely as
//! deterministic domain logic (no IO, no locking, no storage). Stock is not
//! touched here; callers pair these rules with the catalog primitives inside
//! one unit of work.

pub mod fulfillment;
pub mod item;
pub mod numbering;
pub mod order;

pub use fulfillment::{
    FulfillmentLog, Mismatch, OperationType, ReconciliationReport, net_fulfilled, reconcile,
};
pub use item::{AfterReturn, OrderItem};
pub use numbering::OrderNumbering;
pub use order::{
    AddItemToOrder, CloseOrder, CreateOrder, Order, OrderStatus, RemoveItemFromOrder,
    RequestedItem,
};
