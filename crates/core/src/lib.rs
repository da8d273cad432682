//! `stockroom-core`: building blocks shared by every stockroom crate.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;

pub use error::{ErrorClass, ServiceError, ServiceResult};
