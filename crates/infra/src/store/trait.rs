use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use warehouse_alerts::StockAlert;
use warehouse_core::{LedgerError, LedgerResult, OrderId, PartId, StockAlertId};
use warehouse_inventory::Part;
use warehouse_orders::{FulfillmentLog, Order, OrderItem};

/// A unit of serialization inside the store.
///
/// Two units of work whose scopes share a key never overlap in time. Keys are
/// ordered so scopes can be rendered and compared deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    /// SKU uniqueness during part registration.
    Catalog,
    Part(PartId),
    Order(OrderId),
    /// One OR-number sequence.
    OrderSequence { prefix: String, period: i32 },
    /// All stock alerts.
    AlertRegistry,
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LockKey::Catalog => f.write_str("catalog"),
            LockKey::Part(id) => write!(f, "part:{id}"),
            LockKey::Order(id) => write!(f, "order:{id}"),
            LockKey::OrderSequence { prefix, period } => write!(f, "sequence:{prefix}-{period}"),
            LockKey::AlertRegistry => f.write_str("alerts"),
        }
    }
}

/// The set of keys a unit of work serializes on. Declared up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockScope {
    keys: BTreeSet<LockKey>,
}

impl LockScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: LockKey) -> Self {
        self.keys.insert(key);
        self
    }

    pub fn part(self, id: PartId) -> Self {
        self.with(LockKey::Part(id))
    }

    pub fn order(self, id: OrderId) -> Self {
        self.with(LockKey::Order(id))
    }

    pub fn contains(&self, key: &LockKey) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &LockKey> {
        self.keys.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn describe(&self) -> String {
        self.keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Store operation error.
///
/// Infrastructure failures, as opposed to the business rejections carried by
/// `LedgerError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("timed out after {waited:?} waiting for locks on [{keys}]")]
    LockTimeout { waited: Duration, keys: String },

    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// A write touched a record outside the declared lock scope, or a
    /// uniqueness constraint was violated.
    #[error("write conflict: {0}")]
    Conflict(String),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::LockTimeout { .. } => LedgerError::transient(value.to_string()),
            StoreError::Poisoned(_) | StoreError::Conflict(_) => LedgerError::storage(value.to_string()),
        }
    }
}

/// Reads and staged writes inside one atomic unit.
///
/// Reads observe the unit's own staged writes first. Nothing staged is
/// visible to anyone else until the unit commits; an error returned from the
/// work closure discards everything.
pub trait UnitOfWork {
    fn part(&self, id: PartId) -> Result<Option<Part>, StoreError>;

    /// Case-insensitive SKU lookup.
    fn part_by_sku(&self, sku: &str) -> Result<Option<Part>, StoreError>;

    fn put_part(&mut self, part: Part) -> Result<(), StoreError>;

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    fn put_order(&mut self, order: Order) -> Result<(), StoreError>;

    fn order_item(&self, order_id: OrderId, part_id: PartId) -> Result<Option<OrderItem>, StoreError>;

    /// Insert or replace the `(order, part)` line.
    fn put_order_item(&mut self, item: OrderItem) -> Result<(), StoreError>;

    fn delete_order_item(&mut self, order_id: OrderId, part_id: PartId) -> Result<(), StoreError>;

    /// Append-only; there is no update or delete counterpart.
    fn append_log(&mut self, entry: FulfillmentLog) -> Result<(), StoreError>;

    /// Allocate the next value of the `(prefix, period)` sequence, starting at 1.
    fn next_order_sequence(&mut self, prefix: &str, period: i32) -> Result<u32, StoreError>;

    fn alert(&self, id: StockAlertId) -> Result<Option<StockAlert>, StoreError>;

    fn put_alert(&mut self, alert: StockAlert) -> Result<(), StoreError>;

    /// Drop every resolved alert; returns how many were dropped.
    fn purge_resolved_alerts(&mut self) -> Result<usize, StoreError>;
}

/// An order with its items, their parts and its log, read at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub order: Order,
    /// Items paired with their part, `None` if the part is gone.
    pub items: Vec<(OrderItem, Option<Part>)>,
    pub logs: Vec<FulfillmentLog>,
}

/// Transactional persistence collaborator for the ledger.
///
/// ## Atomicity
///
/// `transact` acquires every key in `scope` (waiting at most the store's
/// lock timeout), runs `work`, and commits all staged writes together only if
/// `work` returns `Ok`. A timeout surfaces as `LedgerError::TransientFailure`
/// with nothing written.
///
/// ## Reads
///
/// The plain read methods see committed state only (read-committed) and take
/// no unit-of-work locks. Each call is consistent on its own; use
/// `order_snapshot` when items and logs must agree with each other.
pub trait LedgerStore: Send + Sync {
    fn transact<T, F>(&self, scope: &LockScope, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> LedgerResult<T>;

    fn parts(&self) -> Result<Vec<Part>, StoreError>;

    fn part(&self, id: PartId) -> Result<Option<Part>, StoreError>;

    fn part_by_sku(&self, sku: &str) -> Result<Option<Part>, StoreError>;

    fn orders(&self) -> Result<Vec<Order>, StoreError>;

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Case-insensitive exact match on the OR number.
    fn order_by_number(&self, or_number: &str) -> Result<Option<Order>, StoreError>;

    fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError>;

    /// Log rows for one order, in append order.
    fn fulfillment_logs(&self, order_id: OrderId) -> Result<Vec<FulfillmentLog>, StoreError>;

    /// Order, items and logs under a single read of committed state.
    fn order_snapshot(&self, order_id: OrderId) -> Result<Option<OrderSnapshot>, StoreError>;

    fn alerts(&self) -> Result<Vec<StockAlert>, StoreError>;

    fn alert(&self, id: StockAlertId) -> Result<Option<StockAlert>, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn transact<T, F>(&self, scope: &LockScope, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> LedgerResult<T>,
    {
        (**self).transact(scope, work)
    }

    fn parts(&self) -> Result<Vec<Part>, StoreError> {
        (**self).parts()
    }

    fn part(&self, id: PartId) -> Result<Option<Part>, StoreError> {
        (**self).part(id)
    }

    fn part_by_sku(&self, sku: &str) -> Result<Option<Part>, StoreError> {
        (**self).part_by_sku(sku)
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        (**self).orders()
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).order(id)
    }

    fn order_by_number(&self, or_number: &str) -> Result<Option<Order>, StoreError> {
        (**self).order_by_number(or_number)
    }

    fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        (**self).order_items(order_id)
    }

    fn fulfillment_logs(&self, order_id: OrderId) -> Result<Vec<FulfillmentLog>, StoreError> {
        (**self).fulfillment_logs(order_id)
    }

    fn order_snapshot(&self, order_id: OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        (**self).order_snapshot(order_id)
    }

    fn alerts(&self) -> Result<Vec<StockAlert>, StoreError> {
        (**self).alerts()
    }

    fn alert(&self, id: StockAlertId) -> Result<Option<StockAlert>, StoreError> {
        (**self).alert(id)
    }
}
