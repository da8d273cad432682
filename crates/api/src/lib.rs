//! Stock service: NATS request handling over a transactional inventory store.

pub mod emitter;
pub mod operations;
pub mod response;
pub mod scope;
pub mod server;
pub mod service;

pub use response::StockResponse;
pub use scope::{Halted, RequestScope, Stage};
pub use service::{Operation, Reply, RequestContext, StockService, TransportError};
