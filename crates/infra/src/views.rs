//! Read-side views assembled from committed ledger state.

use serde::Serialize;

use warehouse_core::PartId;
use warehouse_inventory::Part;
use warehouse_orders::{FulfillmentLog, Order, OrderItem, ReconciliationReport, reconcile};

/// One line of an order as shown to warehouse staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub item: OrderItem,
    /// `None` if the part vanished from the catalog.
    pub part: Option<Part>,
}

/// An order with its lines and full movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    /// In append order.
    pub logs: Vec<FulfillmentLog>,
}

impl OrderDetails {
    pub fn line(&self, part_id: PartId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.item.part_id() == part_id)
    }

    /// Units currently delivered across all lines.
    pub fn total_fulfilled(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| u64::from(l.item.quantity_fulfilled()))
            .sum()
    }

    pub fn reconciliation(&self) -> ReconciliationReport {
        let items: Vec<OrderItem> = self.lines.iter().map(|l| l.item.clone()).collect();
        reconcile(&items, &self.logs)
    }
}
