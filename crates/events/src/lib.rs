//! Domain notifications and the bus they travel on.

pub mod bus;
pub mod domain;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use domain::LowStockEvent;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
