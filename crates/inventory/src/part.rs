use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{Entity, LedgerError, LedgerResult, PartId, Quantity};

/// Rotation tier, maintained by the classification collaborator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    High,
    Medium,
    Low,
}

/// A stocked part and its quantity on hand.
///
/// `stock` is unsigned and only changes through [`Part::increase_stock`] and
/// [`Part::decrease_stock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    id: PartId,
    sku: String,
    name: String,
    category: String,
    stock: u32,
    rotation: Option<Rotation>,
    days_in_warehouse: Option<u32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Command: RegisterPart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPart {
    pub part_id: PartId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub initial_stock: u32,
    pub rotation: Option<Rotation>,
    pub days_in_warehouse: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: direct stock correction (restock or manual write-off).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub part_id: PartId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClassifyPart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyPart {
    pub part_id: PartId,
    pub rotation: Option<Rotation>,
    pub days_in_warehouse: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Before/after view of a single stock mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub part_id: PartId,
    pub previous: u32,
    pub current: u32,
}

impl StockMovement {
    /// Signed change actually applied (may be smaller than requested when a
    /// decrease hit the zero floor).
    pub fn delta(&self) -> i64 {
        i64::from(self.current) - i64::from(self.previous)
    }

    /// Whether a decrease was clamped at zero.
    pub fn was_clamped(&self, requested: Quantity) -> bool {
        self.delta() > -requested.signed() && self.delta() <= 0
    }
}

impl Part {
    /// Validate a registration command and build the catalog entry.
    pub fn register(cmd: &RegisterPart) -> LedgerResult<Self> {
        let sku = cmd.sku.trim();
        if sku.is_empty() {
            return Err(LedgerError::validation("sku cannot be empty"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("name cannot be empty"));
        }
        let category = cmd.category.trim();
        if category.is_empty() {
            return Err(LedgerError::validation("category cannot be empty"));
        }

        Ok(Self {
            id: cmd.part_id,
            sku: sku.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            stock: cmd.initial_stock,
            rotation: cmd.rotation,
            days_in_warehouse: cmd.days_in_warehouse,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    pub fn id_typed(&self) -> PartId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn rotation(&self) -> Option<Rotation> {
        self.rotation
    }

    pub fn days_in_warehouse(&self) -> Option<u32> {
        self.days_in_warehouse
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Case-insensitive SKU comparison.
    pub fn sku_matches(&self, candidate: &str) -> bool {
        self.sku.eq_ignore_ascii_case(candidate.trim())
    }

    /// Gate for compound operations: the floor in `decrease_stock` must never
    /// be what keeps stock non-negative on an order delivery.
    pub fn ensure_available(&self, quantity: Quantity) -> LedgerResult<()> {
        if self.stock < quantity.get() {
            return Err(LedgerError::InsufficientStock {
                part_id: self.id,
                requested: quantity.get(),
                available: self.stock,
            });
        }
        Ok(())
    }

    /// Add units to stock. No upper bound beyond the integer range.
    pub fn increase_stock(
        &mut self,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> LedgerResult<StockMovement> {
        let previous = self.stock;
        let current = previous.checked_add(quantity.get()).ok_or_else(|| {
            LedgerError::validation(format!(
                "stock overflow for part {}: {previous} + {quantity}",
                self.id
            ))
        })?;
        self.stock = current;
        self.updated_at = at;
        Ok(StockMovement {
            part_id: self.id,
            previous,
            current,
        })
    }

    /// Remove units from stock, flooring at zero.
    pub fn decrease_stock(&mut self, quantity: Quantity, at: DateTime<Utc>) -> StockMovement {
        let previous = self.stock;
        self.stock = previous.saturating_sub(quantity.get());
        self.updated_at = at;
        StockMovement {
            part_id: self.id,
            previous,
            current: self.stock,
        }
    }

    /// Replace classification metadata. Never touches stock.
    pub fn classify(
        &mut self,
        rotation: Option<Rotation>,
        days_in_warehouse: Option<u32>,
        at: DateTime<Utc>,
    ) {
        self.rotation = rotation;
        self.days_in_warehouse = days_in_warehouse;
        self.updated_at = at;
    }
}

impl Entity for Part {
    type Id = PartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
