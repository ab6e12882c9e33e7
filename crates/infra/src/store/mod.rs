//! Transactional storage boundary for the ledger.
//!
//! Every compound operation runs as one unit of work over a declared lock
//! scope; see [`LedgerStore::transact`].

pub mod in_memory;
pub mod locks;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use locks::{LockGuard, LockTable};
pub use r#trait::{LedgerStore, LockKey, LockScope, OrderSnapshot, StoreError, UnitOfWork};
