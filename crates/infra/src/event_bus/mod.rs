//! Infrastructure event bus implementations.
//!
//! The core event bus abstraction lives in `stockroom-events` as pure mechanics.
//! This module provides broker-backed implementations (NATS).

pub mod nats;

pub use nats::{NatsBusError, NatsEventBus};
