//! Infrastructure layer: transactional storage, the fulfillment engine,
//! configuration.

pub mod config;
pub mod engine;
pub mod store;
pub mod views;

#[cfg(test)]
mod integration_tests;

pub use config::LedgerConfig;
pub use engine::{FulfillmentEngine, OrderCreated, event_types};
pub use store::{
    InMemoryLedgerStore, LedgerStore, LockKey, LockScope, OrderSnapshot, StoreError, UnitOfWork,
};
pub use views::{OrderDetails, OrderLine};
