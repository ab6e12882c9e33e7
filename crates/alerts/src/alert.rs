use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::{Entity, LedgerError, LedgerResult, OrNumber, PartId, StockAlertId};

/// Advisory record of unmet demand.
///
/// `part_name` and `sku` are a snapshot taken when the request was made; they
/// are never refreshed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    id: StockAlertId,
    part_id: PartId,
    part_name: String,
    sku: String,
    requested_quantity: u32,
    or_number: OrNumber,
    technician: String,
    created_at: DateTime<Utc>,
    resolved: bool,
    resolved_at: Option<DateTime<Utc>>,
}

/// Command: RaiseStockAlert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiseStockAlert {
    pub alert_id: StockAlertId,
    pub part_id: PartId,
    pub part_name: String,
    pub sku: String,
    pub requested_quantity: u32,
    pub or_number: String,
    pub technician: String,
    pub occurred_at: DateTime<Utc>,
}

/// Listing filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AlertFilter {
    #[default]
    All,
    Unresolved,
}

impl AlertFilter {
    pub fn matches(self, alert: &StockAlert) -> bool {
        match self {
            AlertFilter::All => true,
            AlertFilter::Unresolved => !alert.resolved,
        }
    }
}

impl StockAlert {
    pub fn raise(cmd: &RaiseStockAlert) -> LedgerResult<Self> {
        if cmd.requested_quantity == 0 {
            return Err(LedgerError::validation("requested quantity must be positive"));
        }
        let technician = cmd.technician.trim();
        if technician.is_empty() {
            return Err(LedgerError::validation("technician cannot be empty"));
        }

        Ok(Self {
            id: cmd.alert_id,
            part_id: cmd.part_id,
            part_name: cmd.part_name.clone(),
            sku: cmd.sku.clone(),
            requested_quantity: cmd.requested_quantity,
            or_number: OrNumber::new(cmd.or_number.as_str())?,
            technician: technician.to_string(),
            created_at: cmd.occurred_at,
            resolved: false,
            resolved_at: None,
        })
    }

    /// Whether a request for `requested` units against `available` warrants an alert.
    pub fn is_shortage(requested: u32, available: u32) -> bool {
        requested > available
    }

    pub fn id_typed(&self) -> StockAlertId {
        self.id
    }

    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn requested_quantity(&self) -> u32 {
        self.requested_quantity
    }

    pub fn or_number(&self) -> &OrNumber {
        &self.or_number
    }

    pub fn technician(&self) -> &str {
        &self.technician
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// `unresolved -> resolved`. Returns `false` (and changes nothing) when
    /// the alert was already resolved.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        self.resolved_at = Some(at);
        true
    }
}

impl Entity for StockAlert {
    type Id = StockAlertId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
