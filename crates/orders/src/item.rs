use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{Entity, LedgerError, LedgerResult, OrderId, OrderItemId, PartId, Quantity};

/// Running required/fulfilled totals for one part within one order.
///
/// The row exists only while something is delivered: it is created on the
/// first delivery and dropped by the caller once [`OrderItem::take_back`]
/// reports [`AfterReturn::Settled`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    id: OrderItemId,
    order_id: OrderId,
    part_id: PartId,
    quantity_required: u32,
    quantity_fulfilled: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// State of a line after units were returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AfterReturn {
    /// Some units are still delivered.
    Remaining,
    /// Nothing delivered any more; the row should be removed.
    Settled,
}

impl OrderItem {
    /// Line created by the first delivery of `part_id` on `order_id`.
    pub fn first_delivery(
        order_id: OrderId,
        part_id: PartId,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            part_id,
            quantity_required: quantity.get(),
            quantity_fulfilled: quantity.get(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn id_typed(&self) -> OrderItemId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    pub fn quantity_required(&self) -> u32 {
        self.quantity_required
    }

    pub fn quantity_fulfilled(&self) -> u32 {
        self.quantity_fulfilled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Record a further delivery on an existing line.
    pub fn deliver(&mut self, quantity: Quantity, at: DateTime<Utc>) -> LedgerResult<()> {
        let overflow = || LedgerError::validation(format!("quantity overflow on order item {}", self.id));
        let required = self
            .quantity_required
            .checked_add(quantity.get())
            .ok_or_else(overflow)?;
        let fulfilled = self
            .quantity_fulfilled
            .checked_add(quantity.get())
            .ok_or_else(overflow)?;
        self.quantity_required = required;
        self.quantity_fulfilled = fulfilled;
        self.updated_at = at;
        Ok(())
    }

    pub fn ensure_removable(&self, quantity: Quantity) -> LedgerResult<()> {
        if self.quantity_fulfilled < quantity.get() {
            return Err(LedgerError::OverRemoval {
                part_id: self.part_id,
                requested: quantity.get(),
                fulfilled: self.quantity_fulfilled,
            });
        }
        Ok(())
    }

    /// Reverse part of a delivery. Rejects removing more than was delivered.
    pub fn take_back(&mut self, quantity: Quantity, at: DateTime<Utc>) -> LedgerResult<AfterReturn> {
        self.ensure_removable(quantity)?;
        self.quantity_required = self.quantity_required.saturating_sub(quantity.get());
        self.quantity_fulfilled = self.quantity_fulfilled.saturating_sub(quantity.get());
        self.updated_at = at;
        if self.quantity_fulfilled == 0 {
            Ok(AfterReturn::Settled)
        } else {
            Ok(AfterReturn::Remaining)
        }
    }
}

impl Entity for OrderItem {
    type Id = OrderItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
