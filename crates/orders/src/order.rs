use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{Entity, LedgerError, LedgerResult, OrNumber, OrderId, PartId, ProjectId};

/// Order status lifecycle: `open -> closed`, no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
}

/// A work order grouping the parts delivered to one technician/project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    or_number: OrNumber,
    technician: String,
    department: String,
    supplier_name: Option<String>,
    project_id: ProjectId,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

/// One line of a technician request: `quantity` units of `part_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub part_id: PartId,
    pub quantity: u32,
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub technician: String,
    pub department: String,
    pub supplier_name: Option<String>,
    pub project_id: ProjectId,
    pub items: Vec<RequestedItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItemToOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemToOrder {
    pub order_id: OrderId,
    pub part_id: PartId,
    pub quantity: u32,
    pub actor: String,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItemFromOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItemFromOrder {
    pub order_id: OrderId,
    pub part_id: PartId,
    pub quantity: u32,
    pub actor: String,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Order {
    /// Build a freshly opened order under an already-allocated number.
    pub fn open(cmd: &CreateOrder, or_number: OrNumber) -> LedgerResult<Self> {
        let technician = cmd.technician.trim();
        if technician.is_empty() {
            return Err(LedgerError::validation("technician cannot be empty"));
        }
        let department = cmd.department.trim();
        if department.is_empty() {
            return Err(LedgerError::validation("department cannot be empty"));
        }
        let supplier_name = cmd
            .supplier_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            id: cmd.order_id,
            or_number,
            technician: technician.to_string(),
            department: department.to_string(),
            supplier_name,
            project_id: cmd.project_id,
            status: OrderStatus::Open,
            created_at: cmd.occurred_at,
            closed_at: None,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn or_number(&self) -> &OrNumber {
        &self.or_number
    }

    pub fn technician(&self) -> &str {
        &self.technician
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn supplier_name(&self) -> Option<&str> {
        self.supplier_name.as_deref()
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, OrderStatus::Open)
    }

    /// Items may only be added or removed while the order is open.
    pub fn ensure_open(&self) -> LedgerResult<()> {
        if !self.is_open() {
            return Err(LedgerError::OrderClosed(self.id));
        }
        Ok(())
    }

    /// Finalize the order. Outstanding items are allowed.
    pub fn close(&mut self, at: DateTime<Utc>) -> LedgerResult<()> {
        if !self.is_open() {
            return Err(LedgerError::invalid_transition(format!(
                "order {} is already closed",
                self.or_number
            )));
        }
        self.status = OrderStatus::Closed;
        self.closed_at = Some(at);
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
