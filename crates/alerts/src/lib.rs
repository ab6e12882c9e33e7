//! Stock alert registry rules.
//!
//! Alerts record technician requests that exceeded available stock when they
//! were made. They are advisory: raising or resolving one never touches stock
//! or orders.

pub mod alert;

pub use alert::{AlertFilter, RaiseStockAlert, StockAlert};
