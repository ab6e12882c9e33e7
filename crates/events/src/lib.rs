//! Notification fan-out for ledger outcomes.
//!
//! The ledger emits human-readable notifications after every mutation attempt.
//! Delivery is best-effort: a failed publish is never allowed to undo a
//! committed ledger write.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::{Notification, Severity};
