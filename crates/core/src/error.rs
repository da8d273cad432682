//! Request-level error model.

use thiserror::Error;

/// Result type used by request-processing stages.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Who is responsible for an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Invalid input or a rejected business rule. Expected traffic.
    Caller,
    /// Infrastructure or configuration failure. An operational anomaly.
    System,
}

/// Two-tier error taxonomy for a single request.
///
/// Both variants render as the bare message: the message is returned verbatim
/// to the caller, and the class only decides how loudly it is logged and
/// whether the trace is marked as failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Invalid input, schema violation, or business-rule rejection.
    #[error("{0}")]
    Caller(String),

    /// Connection, configuration, store, publish or commit failure.
    #[error("{0}")]
    System(String),
}

impl ServiceError {
    pub fn caller(msg: impl Into<String>) -> Self {
        Self::Caller(msg.into())
    }

    pub fn system(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }

    /// The error raised when a request's cancellation signal fires mid-stage.
    pub fn cancelled() -> Self {
        Self::System("request cancelled".to_string())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Caller(_) => ErrorClass::Caller,
            Self::System(_) => ErrorClass::System,
        }
    }

    pub fn is_system(&self) -> bool {
        self.class() == ErrorClass::System
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Caller(msg) | Self::System(msg) => msg,
        }
    }
}
