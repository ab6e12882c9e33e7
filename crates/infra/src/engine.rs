//! Order fulfillment engine.
//!
//! The engine is the only writer of part stock, order item totals and
//! fulfillment log rows. Every mutating operation runs as one unit of work on
//! a [`LedgerStore`]:
//!
//! ```text
//! Command
//!   ↓
//! 1. Declare lock scope (parts, order, sequence, alert registry)
//!   ↓
//! 2. Load records through the unit of work
//!   ↓
//! 3. Apply domain rules (reject before any write)
//!   ↓
//! 4. Stage writes, commit together
//!   ↓
//! 5. Publish a notification (best-effort, after commit)
//! ```
//!
//! A rejected command leaves the store exactly as it was. Notification
//! failures are logged and never undo a commit.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use warehouse_alerts::{AlertFilter, RaiseStockAlert, StockAlert};
use warehouse_core::{
    LedgerError, LedgerResult, OrderId, PartId, Quantity, RecordKind, StockAlertId,
};
use warehouse_events::{Event, EventBus, InMemoryEventBus, Notification};
use warehouse_inventory::{ClassifyPart, Part, RegisterPart, StockAdjustment, StockMovement};
use warehouse_orders::{
    AddItemToOrder, AfterReturn, CloseOrder, CreateOrder, FulfillmentLog, Order, OrderItem,
    OrderNumbering, ReconciliationReport, RemoveItemFromOrder, reconcile,
};

use crate::config::LedgerConfig;
use crate::store::{InMemoryLedgerStore, LedgerStore, LockKey, LockScope, OrderSnapshot, UnitOfWork};
use crate::views::{OrderDetails, OrderLine};

pub mod event_types {
    pub const PART_REGISTERED: &str = "ledger.part.registered";
    pub const STOCK_INCREASED: &str = "ledger.stock.increased";
    pub const STOCK_DECREASED: &str = "ledger.stock.decreased";
    pub const PART_CLASSIFIED: &str = "ledger.part.classified";
    pub const ORDER_CREATED: &str = "ledger.order.created";
    pub const ORDER_CLOSED: &str = "ledger.order.closed";
    pub const ITEM_ADDED: &str = "ledger.order_item.added";
    pub const ITEM_REMOVED: &str = "ledger.order_item.removed";
    pub const ALERT_RAISED: &str = "ledger.stock_alert.raised";
    pub const ALERT_RESOLVED: &str = "ledger.stock_alert.resolved";
    pub const ALERTS_CLEARED: &str = "ledger.stock_alert.cleared";
}

/// Outcome of `create_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreated {
    pub order: Order,
    /// Lines delivered from the initial request.
    pub items: Vec<OrderItem>,
    /// Alerts raised for initial lines that exceeded stock.
    pub alerts: Vec<StockAlert>,
}

/// Ledger orchestration over a transactional store and a notification bus.
///
/// ## Generic Parameters
///
/// - `S`: storage collaborator (`LedgerStore`)
/// - `B`: notification sink (`EventBus<Notification>`)
#[derive(Debug)]
pub struct FulfillmentEngine<S, B> {
    store: S,
    bus: B,
    numbering: OrderNumbering,
}

impl<S, B> FulfillmentEngine<S, B> {
    pub fn new(store: S, bus: B, numbering: OrderNumbering) -> Self {
        Self {
            store,
            bus,
            numbering,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn numbering(&self) -> &OrderNumbering {
        &self.numbering
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl FulfillmentEngine<InMemoryLedgerStore, InMemoryEventBus<Notification>> {
    /// In-memory engine wired from configuration.
    pub fn from_config(config: &LedgerConfig) -> LedgerResult<Self> {
        Ok(Self::new(
            InMemoryLedgerStore::with_lock_timeout(config.lock_timeout()),
            InMemoryEventBus::new(),
            config.numbering()?,
        ))
    }
}

impl<S, B> FulfillmentEngine<S, B>
where
    S: LedgerStore,
    B: EventBus<Notification>,
{
    // ---- part catalog -------------------------------------------------

    #[instrument(skip_all, fields(part_id = %cmd.part_id, sku = %cmd.sku))]
    pub fn register_part(&self, cmd: RegisterPart) -> LedgerResult<Part> {
        let scope = LockScope::new().with(LockKey::Catalog);
        let result = self.store.transact(&scope, |uow| {
            let part = Part::register(&cmd)?;
            if uow.part(part.id_typed())?.is_some() {
                return Err(LedgerError::validation(format!(
                    "part {} already registered",
                    part.id_typed()
                )));
            }
            if let Some(existing) = uow.part_by_sku(part.sku())? {
                return Err(LedgerError::validation(format!(
                    "sku {} already registered to part {}",
                    existing.sku(),
                    existing.id_typed()
                )));
            }
            uow.put_part(part.clone())?;
            Ok(part)
        });

        self.finish(event_types::PART_REGISTERED, cmd.occurred_at, result, |part| {
            Notification::success(
                event_types::PART_REGISTERED,
                format!("part {} ({}) registered with stock {}", part.name(), part.sku(), part.stock()),
                cmd.occurred_at,
            )
            .with_part(part.id_typed())
        })
    }

    /// Restock: add units to a part outside any order.
    #[instrument(skip_all, fields(part_id = %cmd.part_id, quantity = cmd.quantity))]
    pub fn increase_stock(&self, cmd: StockAdjustment) -> LedgerResult<StockMovement> {
        let result = self.adjust(&cmd, |part, q, at| part.increase_stock(q, at));
        self.finish(event_types::STOCK_INCREASED, cmd.occurred_at, result, |m| {
            Notification::success(
                event_types::STOCK_INCREASED,
                format!("stock increased from {} to {}", m.previous, m.current),
                cmd.occurred_at,
            )
            .with_part(m.part_id)
        })
    }

    /// Manual write-off. Floors at zero instead of failing.
    #[instrument(skip_all, fields(part_id = %cmd.part_id, quantity = cmd.quantity))]
    pub fn decrease_stock(&self, cmd: StockAdjustment) -> LedgerResult<StockMovement> {
        let result = self.adjust(&cmd, |part, q, at| Ok(part.decrease_stock(q, at)));
        if let Ok(m) = &result {
            if let Ok(q) = Quantity::new(cmd.quantity) {
                if m.was_clamped(q) {
                    warn!(previous = m.previous, requested = cmd.quantity, "stock decrease clamped at zero");
                }
            }
        }
        self.finish(event_types::STOCK_DECREASED, cmd.occurred_at, result, |m| {
            Notification::success(
                event_types::STOCK_DECREASED,
                format!("stock decreased from {} to {}", m.previous, m.current),
                cmd.occurred_at,
            )
            .with_part(m.part_id)
        })
    }

    fn adjust(
        &self,
        cmd: &StockAdjustment,
        apply: impl FnOnce(&mut Part, Quantity, DateTime<Utc>) -> LedgerResult<StockMovement>,
    ) -> LedgerResult<StockMovement> {
        let quantity = Quantity::new(cmd.quantity)?;
        let scope = LockScope::new().part(cmd.part_id);
        self.store.transact(&scope, |uow| {
            let mut part = load_part(uow, cmd.part_id)?;
            let movement = apply(&mut part, quantity, cmd.occurred_at)?;
            uow.put_part(part)?;
            Ok(movement)
        })
    }

    /// Replace rotation metadata. Stock is untouched.
    #[instrument(skip_all, fields(part_id = %cmd.part_id))]
    pub fn update_part_classification(&self, cmd: ClassifyPart) -> LedgerResult<Part> {
        let scope = LockScope::new().part(cmd.part_id);
        let result = self.store.transact(&scope, |uow| {
            let mut part = load_part(uow, cmd.part_id)?;
            part.classify(cmd.rotation, cmd.days_in_warehouse, cmd.occurred_at);
            uow.put_part(part.clone())?;
            Ok(part)
        });

        self.finish(event_types::PART_CLASSIFIED, cmd.occurred_at, result, |part| {
            Notification::success(
                event_types::PART_CLASSIFIED,
                format!("classification of {} updated", part.sku()),
                cmd.occurred_at,
            )
            .with_part(part.id_typed())
        })
    }

    // ---- orders -------------------------------------------------------

    /// Open an order under the next OR number and deliver its initial lines.
    ///
    /// Initial lines that exceed available stock raise a stock alert instead
    /// of failing the creation.
    #[instrument(skip_all, fields(order_id = %cmd.order_id, items = cmd.items.len()))]
    pub fn create_order(&self, cmd: CreateOrder) -> LedgerResult<OrderCreated> {
        let result = self.create_order_inner(&cmd);

        self.finish(event_types::ORDER_CREATED, cmd.occurred_at, result, |created| {
            let message = if created.alerts.is_empty() {
                format!(
                    "order {} created with {} item(s)",
                    created.order.or_number(),
                    created.items.len()
                )
            } else {
                format!(
                    "order {} created with {} item(s); {} stock alert(s) raised",
                    created.order.or_number(),
                    created.items.len(),
                    created.alerts.len()
                )
            };
            Notification::success(event_types::ORDER_CREATED, message, cmd.occurred_at)
                .with_order(created.order.id_typed())
        })
    }

    fn create_order_inner(&self, cmd: &CreateOrder) -> LedgerResult<OrderCreated> {
        let requested = cmd
            .items
            .iter()
            .map(|line| Quantity::new(line.quantity).map(|q| (line.part_id, q)))
            .collect::<LedgerResult<Vec<(PartId, Quantity)>>>()?;

        let period = self.numbering.period(cmd.occurred_at);
        let mut scope = LockScope::new()
            .order(cmd.order_id)
            .with(LockKey::OrderSequence {
                prefix: self.numbering.prefix().to_string(),
                period,
            });
        if !requested.is_empty() {
            scope = scope.with(LockKey::AlertRegistry);
        }
        for (part_id, _) in &requested {
            scope = scope.part(*part_id);
        }

        self.store.transact(&scope, |uow| {
            if uow.order(cmd.order_id)?.is_some() {
                return Err(LedgerError::validation(format!(
                    "order {} already exists",
                    cmd.order_id
                )));
            }

            let sequence = uow.next_order_sequence(self.numbering.prefix(), period)?;
            let order = Order::open(cmd, self.numbering.compose(period, sequence))?;
            uow.put_order(order.clone())?;

            let mut items: Vec<OrderItem> = Vec::new();
            let mut alerts = Vec::new();
            for (part_id, quantity) in requested {
                let part = load_part(uow, part_id)?;
                if StockAlert::is_shortage(quantity.get(), part.stock()) {
                    let alert = StockAlert::raise(&RaiseStockAlert {
                        alert_id: StockAlertId::new(),
                        part_id,
                        part_name: part.name().to_string(),
                        sku: part.sku().to_string(),
                        requested_quantity: quantity.get(),
                        or_number: order.or_number().to_string(),
                        technician: order.technician().to_string(),
                        occurred_at: cmd.occurred_at,
                    })?;
                    uow.put_alert(alert.clone())?;
                    alerts.push(alert);
                    continue;
                }

                let item = apply_addition(
                    uow,
                    order.id_typed(),
                    part,
                    quantity,
                    order.technician(),
                    None,
                    cmd.occurred_at,
                )?;
                match items.iter_mut().find(|i| i.part_id() == part_id) {
                    Some(existing) => *existing = item,
                    None => items.push(item),
                }
            }

            Ok(OrderCreated {
                order,
                items,
                alerts,
            })
        })
    }

    /// `open -> closed`. Outstanding items are allowed.
    #[instrument(skip_all, fields(order_id = %cmd.order_id))]
    pub fn close_order(&self, cmd: CloseOrder) -> LedgerResult<Order> {
        let scope = LockScope::new().order(cmd.order_id);
        let result = self.store.transact(&scope, |uow| {
            let mut order = load_order(uow, cmd.order_id)?;
            order.close(cmd.occurred_at)?;
            uow.put_order(order.clone())?;
            Ok(order)
        });

        self.finish(event_types::ORDER_CLOSED, cmd.occurred_at, result, |order| {
            Notification::success(
                event_types::ORDER_CLOSED,
                format!("order {} closed", order.or_number()),
                cmd.occurred_at,
            )
            .with_order(order.id_typed())
        })
    }

    /// Case-insensitive exact match. Absence is `Ok(None)`.
    #[instrument(skip(self))]
    pub fn find_order_by_number(&self, or_number: &str) -> LedgerResult<Option<Order>> {
        let found = self.store.order_by_number(or_number.trim())?;
        debug!(found = found.is_some(), "order lookup");
        Ok(found)
    }

    /// Deliver `quantity` units of a part against an open order.
    ///
    /// Fails with `InsufficientStock` (and writes nothing) when stock is
    /// short; no alert is raised on this path.
    #[instrument(
        skip_all,
        fields(order_id = %cmd.order_id, part_id = %cmd.part_id, quantity = cmd.quantity)
    )]
    pub fn add_item_to_order(&self, cmd: AddItemToOrder) -> LedgerResult<OrderItem> {
        let result = self.add_item_inner(&cmd);
        self.finish(event_types::ITEM_ADDED, cmd.occurred_at, result, |item| {
            Notification::success(
                event_types::ITEM_ADDED,
                format!(
                    "{} unit(s) delivered by {}; {} fulfilled on this line",
                    cmd.quantity,
                    cmd.actor.trim(),
                    item.quantity_fulfilled()
                ),
                cmd.occurred_at,
            )
            .with_order(cmd.order_id)
            .with_part(cmd.part_id)
        })
    }

    fn add_item_inner(&self, cmd: &AddItemToOrder) -> LedgerResult<OrderItem> {
        let quantity = Quantity::new(cmd.quantity)?;
        let actor = require_actor(&cmd.actor)?;
        let scope = LockScope::new().order(cmd.order_id).part(cmd.part_id);

        self.store.transact(&scope, |uow| {
            let order = load_order(uow, cmd.order_id)?;
            order.ensure_open()?;
            let part = load_part(uow, cmd.part_id)?;
            apply_addition(
                uow,
                order.id_typed(),
                part,
                quantity,
                actor,
                cmd.notes.clone(),
                cmd.occurred_at,
            )
        })
    }

    /// Return units delivered on an open order.
    ///
    /// Returns the remaining line, or `None` once nothing is delivered and the
    /// line was dropped.
    #[instrument(
        skip_all,
        fields(order_id = %cmd.order_id, part_id = %cmd.part_id, quantity = cmd.quantity)
    )]
    pub fn remove_item_from_order(&self, cmd: RemoveItemFromOrder) -> LedgerResult<Option<OrderItem>> {
        let result = self.remove_item_inner(&cmd);
        self.finish(event_types::ITEM_REMOVED, cmd.occurred_at, result, |remaining| {
            let message = match remaining {
                Some(item) => format!(
                    "{} unit(s) returned by {}; {} still fulfilled on this line",
                    cmd.quantity,
                    cmd.actor.trim(),
                    item.quantity_fulfilled()
                ),
                None => format!(
                    "{} unit(s) returned by {}; line settled",
                    cmd.quantity,
                    cmd.actor.trim()
                ),
            };
            Notification::success(event_types::ITEM_REMOVED, message, cmd.occurred_at)
                .with_order(cmd.order_id)
                .with_part(cmd.part_id)
        })
    }

    fn remove_item_inner(&self, cmd: &RemoveItemFromOrder) -> LedgerResult<Option<OrderItem>> {
        let quantity = Quantity::new(cmd.quantity)?;
        let actor = require_actor(&cmd.actor)?;
        let scope = LockScope::new().order(cmd.order_id).part(cmd.part_id);

        self.store.transact(&scope, |uow| {
            let order = load_order(uow, cmd.order_id)?;
            order.ensure_open()?;
            let mut part = load_part(uow, cmd.part_id)?;
            let mut item = uow
                .order_item(cmd.order_id, cmd.part_id)?
                .ok_or(LedgerError::OverRemoval {
                    part_id: cmd.part_id,
                    requested: quantity.get(),
                    fulfilled: 0,
                })?;
            item.ensure_removable(quantity)?;

            part.increase_stock(quantity, cmd.occurred_at)?;
            uow.put_part(part)?;

            let remaining = match item.take_back(quantity, cmd.occurred_at)? {
                AfterReturn::Settled => {
                    uow.delete_order_item(cmd.order_id, cmd.part_id)?;
                    None
                }
                AfterReturn::Remaining => {
                    uow.put_order_item(item.clone())?;
                    Some(item)
                }
            };

            uow.append_log(FulfillmentLog::removal(
                cmd.order_id,
                cmd.part_id,
                quantity,
                actor,
                cmd.occurred_at,
                cmd.notes.clone(),
            ))?;
            Ok(remaining)
        })
    }

    // ---- stock alerts -------------------------------------------------

    #[instrument(skip_all, fields(part_id = %cmd.part_id, requested = cmd.requested_quantity))]
    pub fn raise_stock_alert(&self, cmd: RaiseStockAlert) -> LedgerResult<StockAlert> {
        let scope = LockScope::new().with(LockKey::AlertRegistry);
        let result = self.store.transact(&scope, |uow| {
            if uow.part(cmd.part_id)?.is_none() {
                return Err(LedgerError::PartNotFound(cmd.part_id));
            }
            let alert = StockAlert::raise(&cmd)?;
            uow.put_alert(alert.clone())?;
            Ok(alert)
        });

        self.finish(event_types::ALERT_RAISED, cmd.occurred_at, result, |alert| {
            Notification::warning(
                event_types::ALERT_RAISED,
                format!(
                    "{} requested {} x {} ({}) on {}",
                    alert.technician(),
                    alert.requested_quantity(),
                    alert.part_name(),
                    alert.sku(),
                    alert.or_number()
                ),
                cmd.occurred_at,
            )
            .with_part(alert.part_id())
        })
    }

    /// Idempotent: resolving a resolved alert returns it unchanged, writes
    /// nothing and publishes nothing.
    #[instrument(skip(self, at))]
    pub fn resolve_stock_alert(&self, alert_id: StockAlertId, at: DateTime<Utc>) -> LedgerResult<StockAlert> {
        let scope = LockScope::new().with(LockKey::AlertRegistry);
        let result = self.store.transact(&scope, |uow| {
            let mut alert = uow
                .alert(alert_id)?
                .ok_or_else(|| LedgerError::not_found(RecordKind::StockAlert, alert_id))?;
            let changed = alert.resolve(at);
            if changed {
                uow.put_alert(alert.clone())?;
            }
            Ok((alert, changed))
        });

        if let Ok((alert, false)) = &result {
            debug!(resolved_at = ?alert.resolved_at(), "alert already resolved");
            return Ok(alert.clone());
        }

        self.finish(event_types::ALERT_RESOLVED, at, result, |(alert, _)| {
            Notification::success(
                event_types::ALERT_RESOLVED,
                format!("stock alert for {} resolved", alert.sku()),
                at,
            )
            .with_part(alert.part_id())
        })
        .map(|(alert, _)| alert)
    }

    /// Purge resolved alerts. Returns how many were removed.
    #[instrument(skip_all)]
    pub fn clear_resolved_alerts(&self, at: DateTime<Utc>) -> LedgerResult<usize> {
        let scope = LockScope::new().with(LockKey::AlertRegistry);
        let result = self
            .store
            .transact(&scope, |uow| Ok(uow.purge_resolved_alerts()?));

        self.finish(event_types::ALERTS_CLEARED, at, result, |count| {
            Notification::success(
                event_types::ALERTS_CLEARED,
                format!("{count} resolved alert(s) cleared"),
                at,
            )
        })
    }

    // ---- reads --------------------------------------------------------

    /// Catalog ordered by name.
    pub fn parts(&self) -> LedgerResult<Vec<Part>> {
        let mut parts = self.store.parts()?;
        parts.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.sku().cmp(b.sku())));
        Ok(parts)
    }

    pub fn part(&self, part_id: PartId) -> LedgerResult<Part> {
        self.store
            .part(part_id)?
            .ok_or_else(|| LedgerError::not_found(RecordKind::Part, part_id))
    }

    /// Case-insensitive SKU lookup. Absence is `Ok(None)`.
    pub fn find_part_by_sku(&self, sku: &str) -> LedgerResult<Option<Part>> {
        Ok(self.store.part_by_sku(sku.trim())?)
    }

    /// Newest first.
    pub fn orders(&self) -> LedgerResult<Vec<Order>> {
        let mut orders = self.store.orders()?;
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.or_number().as_str().cmp(a.or_number().as_str()))
        });
        Ok(orders)
    }

    pub fn order(&self, order_id: OrderId) -> LedgerResult<Order> {
        self.store
            .order(order_id)?
            .ok_or_else(|| LedgerError::not_found(RecordKind::Order, order_id))
    }

    pub fn order_items(&self, order_id: OrderId) -> LedgerResult<Vec<OrderItem>> {
        Ok(self.store.order_items(order_id)?)
    }

    pub fn fulfillment_logs(&self, order_id: OrderId) -> LedgerResult<Vec<FulfillmentLog>> {
        Ok(self.store.fulfillment_logs(order_id)?)
    }

    /// Order, lines with their parts, and the movement history.
    pub fn order_details(&self, order_id: OrderId) -> LedgerResult<OrderDetails> {
        let snapshot = self.snapshot(order_id)?;
        let lines = snapshot
            .items
            .into_iter()
            .map(|(item, part)| OrderLine { item, part })
            .collect();
        Ok(OrderDetails {
            order: snapshot.order,
            lines,
            logs: snapshot.logs,
        })
    }

    fn snapshot(&self, order_id: OrderId) -> LedgerResult<OrderSnapshot> {
        self.store
            .order_snapshot(order_id)?
            .ok_or_else(|| LedgerError::not_found(RecordKind::Order, order_id))
    }

    /// Newest first.
    pub fn stock_alerts(&self, filter: AlertFilter) -> LedgerResult<Vec<StockAlert>> {
        let mut alerts: Vec<StockAlert> = self
            .store
            .alerts()?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        alerts.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id_typed().cmp(&a.id_typed())));
        Ok(alerts)
    }

    pub fn stock_alert(&self, alert_id: StockAlertId) -> LedgerResult<StockAlert> {
        self.store
            .alert(alert_id)?
            .ok_or_else(|| LedgerError::not_found(RecordKind::StockAlert, alert_id))
    }

    /// Audit an order's lines against its log.
    #[instrument(skip(self))]
    pub fn reconcile_order(&self, order_id: OrderId) -> LedgerResult<ReconciliationReport> {
        let snapshot = self.snapshot(order_id)?;
        let items: Vec<OrderItem> = snapshot.items.into_iter().map(|(item, _)| item).collect();
        let report = reconcile(&items, &snapshot.logs);
        if !report.is_consistent() {
            warn!(mismatches = report.mismatches.len(), "order items disagree with fulfillment log");
        }
        Ok(report)
    }

    // ---- reporting ----------------------------------------------------

    /// Log the outcome and publish a notification for it.
    fn finish<T>(
        &self,
        event_type: &'static str,
        at: DateTime<Utc>,
        result: LedgerResult<T>,
        describe: impl FnOnce(&T) -> Notification,
    ) -> LedgerResult<T> {
        let notification = match &result {
            Ok(value) => {
                let n = describe(value);
                info!(event_type, message = %n.message, "committed");
                n
            }
            Err(err) if err.is_business_rejection() => {
                debug!(event_type, error = %err, "rejected");
                Notification::warning(event_type, err.to_string(), at)
            }
            Err(err) if err.is_retryable() => {
                warn!(event_type, error = %err, "transient failure");
                Notification::failure(event_type, err.to_string(), at)
            }
            Err(err) => {
                warn!(event_type, error = %err, "failed");
                Notification::failure(event_type, err.to_string(), at)
            }
        };
        self.notify(notification);
        result
    }

    fn notify(&self, notification: Notification) {
        publish_best_effort(&self.bus, notification);
    }
}

/// Publish after commit. A failed publish is logged and otherwise ignored.
fn publish_best_effort<E, B>(bus: &B, event: E)
where
    E: Event,
    B: EventBus<E>,
{
    let event_type = event.event_type();
    let version = event.version();
    let occurred_at = event.occurred_at();
    if let Err(err) = bus.publish(event) {
        warn!(event_type, version, %occurred_at, error = ?err, "notification not delivered");
    }
}

fn require_actor(actor: &str) -> LedgerResult<&str> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(LedgerError::validation("actor cannot be empty"));
    }
    Ok(actor)
}

fn load_part(uow: &dyn UnitOfWork, part_id: PartId) -> LedgerResult<Part> {
    uow.part(part_id)?.ok_or(LedgerError::PartNotFound(part_id))
}

fn load_order(uow: &dyn UnitOfWork, order_id: OrderId) -> LedgerResult<Order> {
    uow.order(order_id)?.ok_or(LedgerError::OrderNotFound(order_id))
}

/// Stock check, deduction, line upsert and `+q` log row.
fn apply_addition(
    uow: &mut dyn UnitOfWork,
    order_id: OrderId,
    mut part: Part,
    quantity: Quantity,
    actor: &str,
    notes: Option<String>,
    at: DateTime<Utc>,
) -> LedgerResult<OrderItem> {
    part.ensure_available(quantity)?;
    let part_id = part.id_typed();
    part.decrease_stock(quantity, at);
    uow.put_part(part)?;

    let item = match uow.order_item(order_id, part_id)? {
        Some(mut existing) => {
            existing.deliver(quantity, at)?;
            existing
        }
        None => OrderItem::first_delivery(order_id, part_id, quantity, at),
    };
    uow.put_order_item(item.clone())?;

    uow.append_log(FulfillmentLog::addition(order_id, part_id, quantity, actor, at, notes))?;
    Ok(item)
}
