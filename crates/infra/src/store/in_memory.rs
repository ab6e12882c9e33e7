use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use warehouse_alerts::StockAlert;
use warehouse_core::{Entity, LedgerResult, OrderId, PartId, StockAlertId};
use warehouse_inventory::Part;
use warehouse_orders::{FulfillmentLog, Order, OrderItem};

use super::locks::LockTable;
use super::r#trait::{LedgerStore, LockKey, LockScope, OrderSnapshot, StoreError, UnitOfWork};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

type ItemKey = (OrderId, PartId);
type SequenceKey = (String, i32);

#[derive(Debug, Default)]
struct Tables {
    parts: HashMap<PartId, Part>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<ItemKey, OrderItem>,
    logs: Vec<FulfillmentLog>,
    sequences: HashMap<SequenceKey, u32>,
    alerts: HashMap<StockAlertId, StockAlert>,
}

impl Tables {
    fn items_of(&self, order_id: OrderId) -> Vec<OrderItem> {
        let mut items: Vec<OrderItem> = self
            .order_items
            .values()
            .filter(|i| i.order_id() == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_at(), i.id_typed()));
        items
    }

    fn logs_of(&self, order_id: OrderId) -> Vec<FulfillmentLog> {
        self.logs
            .iter()
            .filter(|l| l.order_id() == order_id)
            .cloned()
            .collect()
    }
}

fn index<E: Entity>(records: impl IntoIterator<Item = E>) -> HashMap<E::Id, E> {
    records.into_iter().map(|r| (*r.id(), r)).collect()
}

fn poisoned() -> StoreError {
    StoreError::Poisoned("ledger tables".to_string())
}

/// In-memory transactional ledger store.
///
/// Intended for tests/dev. Units of work serialize on their declared lock
/// scope and stage writes privately; commit applies them under one write lock.
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    tables: RwLock<Tables>,
    locks: LockTable,
    lock_timeout: Duration,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: LockTable::new(),
            lock_timeout,
        }
    }

    /// Store pre-populated with a catalog (fixtures, benches).
    pub fn with_parts(parts: impl IntoIterator<Item = Part>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                parts: index(parts),
                ..Tables::default()
            }),
            locks: LockTable::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    fn commit(&self, staged: Staged) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;

        // Sequences only move forward, so bump them before anything else.
        for (key, value) in staged.sequences {
            let current = tables.sequences.entry(key).or_default();
            *current = (*current).max(value);
        }
        tables.parts.extend(staged.parts);
        tables.orders.extend(staged.orders);
        for (key, item) in staged.order_items {
            match item {
                Some(item) => {
                    tables.order_items.insert(key, item);
                }
                None => {
                    tables.order_items.remove(&key);
                }
            }
        }
        tables.logs.extend(staged.logs);
        for (id, alert) in staged.alerts {
            match alert {
                Some(alert) => {
                    tables.alerts.insert(id, alert);
                }
                None => {
                    tables.alerts.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(f(&tables))
    }
}

/// Writes staged by one unit of work. `None` marks a deletion.
#[derive(Debug, Default)]
struct Staged {
    parts: HashMap<PartId, Part>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<ItemKey, Option<OrderItem>>,
    logs: Vec<FulfillmentLog>,
    sequences: HashMap<SequenceKey, u32>,
    alerts: HashMap<StockAlertId, Option<StockAlert>>,
}

struct InMemoryUnitOfWork<'a> {
    tables: &'a RwLock<Tables>,
    scope: &'a LockScope,
    staged: Staged,
}

impl<'a> InMemoryUnitOfWork<'a> {
    fn new(tables: &'a RwLock<Tables>, scope: &'a LockScope) -> Self {
        Self {
            tables,
            scope,
            staged: Staged::default(),
        }
    }

    fn committed(&self) -> Result<std::sync::RwLockReadGuard<'a, Tables>, StoreError> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn require(&self, key: &LockKey, what: &str) -> Result<(), StoreError> {
        if self.scope.contains(key) {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!("{what} outside lock scope (missing {key})")))
        }
    }

    fn require_part_write(&self, id: PartId) -> Result<(), StoreError> {
        // New parts are created under the catalog key.
        if self.scope.contains(&LockKey::Part(id)) || self.scope.contains(&LockKey::Catalog) {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!(
                "write to part {id} outside lock scope"
            )))
        }
    }
}

impl UnitOfWork for InMemoryUnitOfWork<'_> {
    fn part(&self, id: PartId) -> Result<Option<Part>, StoreError> {
        if let Some(part) = self.staged.parts.get(&id) {
            return Ok(Some(part.clone()));
        }
        Ok(self.committed()?.parts.get(&id).cloned())
    }

    fn part_by_sku(&self, sku: &str) -> Result<Option<Part>, StoreError> {
        if let Some(part) = self.staged.parts.values().find(|p| p.sku_matches(sku)) {
            return Ok(Some(part.clone()));
        }
        let committed = self.committed()?;
        Ok(committed
            .parts
            .values()
            .filter(|p| !self.staged.parts.contains_key(&p.id_typed()))
            .find(|p| p.sku_matches(sku))
            .cloned())
    }

    fn put_part(&mut self, part: Part) -> Result<(), StoreError> {
        self.require_part_write(part.id_typed())?;
        let sku_unchanged = self
            .part(part.id_typed())?
            .is_some_and(|current| current.sku() == part.sku());
        if sku_unchanged {
            self.staged.parts.insert(part.id_typed(), part);
            return Ok(());
        }
        if let Some(other) = self.part_by_sku(part.sku())? {
            if other.id_typed() != part.id_typed() {
                return Err(StoreError::Conflict(format!(
                    "sku {} already used by part {}",
                    part.sku(),
                    other.id_typed()
                )));
            }
        }
        self.staged.parts.insert(part.id_typed(), part);
        Ok(())
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        if let Some(order) = self.staged.orders.get(&id) {
            return Ok(Some(order.clone()));
        }
        Ok(self.committed()?.orders.get(&id).cloned())
    }

    fn put_order(&mut self, order: Order) -> Result<(), StoreError> {
        self.require(&LockKey::Order(order.id_typed()), "order write")?;
        self.staged.orders.insert(order.id_typed(), order);
        Ok(())
    }

    fn order_item(&self, order_id: OrderId, part_id: PartId) -> Result<Option<OrderItem>, StoreError> {
        if let Some(staged) = self.staged.order_items.get(&(order_id, part_id)) {
            return Ok(staged.clone());
        }
        Ok(self.committed()?.order_items.get(&(order_id, part_id)).cloned())
    }

    fn put_order_item(&mut self, item: OrderItem) -> Result<(), StoreError> {
        self.require(&LockKey::Order(item.order_id()), "order item write")?;
        self.require(&LockKey::Part(item.part_id()), "order item write")?;
        self.staged
            .order_items
            .insert((item.order_id(), item.part_id()), Some(item));
        Ok(())
    }

    fn delete_order_item(&mut self, order_id: OrderId, part_id: PartId) -> Result<(), StoreError> {
        self.require(&LockKey::Order(order_id), "order item delete")?;
        self.require(&LockKey::Part(part_id), "order item delete")?;
        self.staged.order_items.insert((order_id, part_id), None);
        Ok(())
    }

    fn append_log(&mut self, entry: FulfillmentLog) -> Result<(), StoreError> {
        self.require(&LockKey::Order(entry.order_id()), "log append")?;
        self.staged.logs.push(entry);
        Ok(())
    }

    fn next_order_sequence(&mut self, prefix: &str, period: i32) -> Result<u32, StoreError> {
        let lock = LockKey::OrderSequence {
            prefix: prefix.to_string(),
            period,
        };
        self.require(&lock, "sequence allocation")?;

        let key = (prefix.to_string(), period);
        let last = match self.staged.sequences.get(&key) {
            Some(value) => *value,
            None => self.committed()?.sequences.get(&key).copied().unwrap_or(0),
        };
        let next = last
            .checked_add(1)
            .ok_or_else(|| StoreError::Conflict(format!("sequence {prefix}-{period} exhausted")))?;
        self.staged.sequences.insert(key, next);
        Ok(next)
    }

    fn alert(&self, id: StockAlertId) -> Result<Option<StockAlert>, StoreError> {
        if let Some(staged) = self.staged.alerts.get(&id) {
            return Ok(staged.clone());
        }
        Ok(self.committed()?.alerts.get(&id).cloned())
    }

    fn put_alert(&mut self, alert: StockAlert) -> Result<(), StoreError> {
        self.require(&LockKey::AlertRegistry, "alert write")?;
        self.staged.alerts.insert(alert.id_typed(), Some(alert));
        Ok(())
    }

    fn purge_resolved_alerts(&mut self) -> Result<usize, StoreError> {
        self.require(&LockKey::AlertRegistry, "alert purge")?;

        let mut doomed: Vec<StockAlertId> = self
            .staged
            .alerts
            .iter()
            .filter_map(|(id, a)| a.as_ref().filter(|a| a.is_resolved()).map(|_| *id))
            .collect();
        {
            let committed = self.committed()?;
            doomed.extend(
                committed
                    .alerts
                    .values()
                    .filter(|a| a.is_resolved() && !self.staged.alerts.contains_key(&a.id_typed()))
                    .map(|a| a.id_typed()),
            );
        }

        for id in &doomed {
            self.staged.alerts.insert(*id, None);
        }
        Ok(doomed.len())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn transact<T, F>(&self, scope: &LockScope, work: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> LedgerResult<T>,
    {
        let _guard = self.locks.acquire(scope, self.lock_timeout)?;

        let mut uow = InMemoryUnitOfWork::new(&self.tables, scope);
        let value = work(&mut uow)?;
        self.commit(uow.staged)?;
        Ok(value)
    }

    fn parts(&self) -> Result<Vec<Part>, StoreError> {
        self.read(|t| t.parts.values().cloned().collect())
    }

    fn part(&self, id: PartId) -> Result<Option<Part>, StoreError> {
        self.read(|t| t.parts.get(&id).cloned())
    }

    fn part_by_sku(&self, sku: &str) -> Result<Option<Part>, StoreError> {
        self.read(|t| t.parts.values().find(|p| p.sku_matches(sku)).cloned())
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        self.read(|t| t.orders.values().cloned().collect())
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.read(|t| t.orders.get(&id).cloned())
    }

    fn order_by_number(&self, or_number: &str) -> Result<Option<Order>, StoreError> {
        self.read(|t| {
            t.orders
                .values()
                .find(|o| o.or_number().matches(or_number))
                .cloned()
        })
    }

    fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        self.read(|t| t.items_of(order_id))
    }

    fn fulfillment_logs(&self, order_id: OrderId) -> Result<Vec<FulfillmentLog>, StoreError> {
        self.read(|t| t.logs_of(order_id))
    }

    fn order_snapshot(&self, order_id: OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        self.read(|t| {
            let order = t.orders.get(&order_id)?.clone();
            let items = t
                .items_of(order_id)
                .into_iter()
                .map(|item| {
                    let part = t.parts.get(&item.part_id()).cloned();
                    (item, part)
                })
                .collect();
            Some(OrderSnapshot {
                order,
                items,
                logs: t.logs_of(order_id),
            })
        })
    }

    fn alerts(&self) -> Result<Vec<StockAlert>, StoreError> {
        self.read(|t| t.alerts.values().cloned().collect())
    }

    fn alert(&self, id: StockAlertId) -> Result<Option<StockAlert>, StoreError> {
        self.read(|t| t.alerts.get(&id).cloned())
    }
}
