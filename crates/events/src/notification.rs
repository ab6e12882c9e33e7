use chrono::{DateTime, Utc};
use serde::Serialize;

use warehouse_core::{OrderId, PartId};

use crate::event::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Failure,
}

/// Human-readable outcome of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub event_type: &'static str,
    pub message: String,
    pub order_id: Option<OrderId>,
    pub part_id: Option<PartId>,
    pub occurred_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        severity: Severity,
        event_type: &'static str,
        message: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            severity,
            event_type,
            message: message.into(),
            order_id: None,
            part_id: None,
            occurred_at,
        }
    }

    pub fn success(event_type: &'static str, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(Severity::Success, event_type, message, at)
    }

    pub fn warning(event_type: &'static str, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(Severity::Warning, event_type, message, at)
    }

    pub fn failure(event_type: &'static str, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(Severity::Failure, event_type, message, at)
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_part(mut self, part_id: PartId) -> Self {
        self.part_id = Some(part_id);
        self
    }
}

impl Event for Notification {
    fn event_type(&self) -> &'static str {
        self.event_type
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
