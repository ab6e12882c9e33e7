//! Append-only audit trail of stock movements tied to orders.
//!
//! Every add/remove on an order writes exactly one row. Rows are never updated
//! or deleted, so for every `(order, part)` pair the signed sum of its rows is
//! the quantity currently delivered.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{FulfillmentLogId, OrderId, PartId, Quantity};

use crate::item::OrderItem;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Add,
    Remove,
}

/// Immutable movement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentLog {
    id: FulfillmentLogId,
    order_id: OrderId,
    part_id: PartId,
    quantity: i64,
    operation_type: OperationType,
    assigned_by: String,
    assigned_at: DateTime<Utc>,
    notes: Option<String>,
}

impl FulfillmentLog {
    /// Row for a delivery: `+quantity`.
    pub fn addition(
        order_id: OrderId,
        part_id: PartId,
        quantity: Quantity,
        assigned_by: impl Into<String>,
        assigned_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self::record(
            order_id,
            part_id,
            quantity.signed(),
            OperationType::Add,
            assigned_by.into(),
            assigned_at,
            notes,
        )
    }

    /// Row for a return: `-quantity`.
    pub fn removal(
        order_id: OrderId,
        part_id: PartId,
        quantity: Quantity,
        assigned_by: impl Into<String>,
        assigned_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self::record(
            order_id,
            part_id,
            -quantity.signed(),
            OperationType::Remove,
            assigned_by.into(),
            assigned_at,
            notes,
        )
    }

    fn record(
        order_id: OrderId,
        part_id: PartId,
        quantity: i64,
        operation_type: OperationType,
        assigned_by: String,
        assigned_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: FulfillmentLogId::new(),
            order_id,
            part_id,
            quantity,
            operation_type,
            assigned_by,
            assigned_at,
            notes: notes.filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn id(&self) -> FulfillmentLogId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    /// Signed: positive for additions, negative for removals.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn assigned_by(&self) -> &str {
        &self.assigned_by
    }

    pub fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// Net delivered quantity of `part_id` on `order_id` according to the log.
pub fn net_fulfilled<'a>(
    logs: impl IntoIterator<Item = &'a FulfillmentLog>,
    order_id: OrderId,
    part_id: PartId,
) -> i64 {
    logs.into_iter()
        .filter(|l| l.order_id == order_id && l.part_id == part_id)
        .map(|l| l.quantity)
        .sum()
}

/// One `(order, part)` pair whose log sum disagrees with its order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub order_id: OrderId,
    pub part_id: PartId,
    /// `0` when no order item exists for the pair.
    pub quantity_fulfilled: u32,
    pub log_sum: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub pairs_checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare order items against the log.
///
/// Pairs present only in the log must net to zero (their item was removed
/// after a full return).
pub fn reconcile(items: &[OrderItem], logs: &[FulfillmentLog]) -> ReconciliationReport {
    let mut sums: BTreeMap<(OrderId, PartId), i64> = BTreeMap::new();
    for log in logs {
        *sums.entry((log.order_id, log.part_id)).or_default() += log.quantity;
    }

    let mut fulfilled: BTreeMap<(OrderId, PartId), u32> = BTreeMap::new();
    for item in items {
        fulfilled.insert((item.order_id(), item.part_id()), item.quantity_fulfilled());
        sums.entry((item.order_id(), item.part_id())).or_default();
    }

    let mut report = ReconciliationReport {
        pairs_checked: sums.len(),
        mismatches: Vec::new(),
    };
    for ((order_id, part_id), log_sum) in sums {
        let quantity_fulfilled = fulfilled.get(&(order_id, part_id)).copied().unwrap_or(0);
        if i64::from(quantity_fulfilled) != log_sum {
            report.mismatches.push(Mismatch {
                order_id,
                part_id,
                quantity_fulfilled,
                log_sum,
            });
        }
    }
    report
}
