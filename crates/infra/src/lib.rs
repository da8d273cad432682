//! Infrastructure layer: relational store, message bus, schemas, config.

pub mod config;
pub mod event_bus;
pub mod schema;
pub mod store;
