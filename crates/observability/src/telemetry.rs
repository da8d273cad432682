//! Request-level tracing handle.
//!
//! A `Telemetry` is built once at startup and passed down explicitly; no stage
//! of the request pipeline reaches for a global tracer.

use std::fmt::Display;
use std::sync::Arc;

use tracing::Span;
use tracing::field::{Empty, display};

#[derive(Debug, Clone)]
pub struct Telemetry {
    service: Arc<str>,
    version: Arc<str>,
}

impl Telemetry {
    pub fn new(service: impl Into<Arc<str>>, version: impl Into<Arc<str>>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Root span for one inbound message, named after its subject.
    pub fn request_span(&self, subject: &str, request_id: &dyn Display) -> Span {
        tracing::info_span!(
            "request",
            otel.name = %subject,
            service.name = %self.service,
            service.version = %self.version,
            request_id = %request_id,
            otel.status_code = Empty,
            error = Empty,
        )
    }

    /// Child span for one pipeline stage ("validate JSON", "tx commit", ...).
    pub fn stage_span(&self, request: &Span, stage: &'static str) -> Span {
        tracing::info_span!(
            parent: request,
            "stage",
            otel.name = stage,
            otel.status_code = Empty,
            error = Empty,
        )
    }

    /// Entry log line for an inbound message.
    pub fn api_request(&self, request: &Span, subject: &str, payload_len: usize) {
        tracing::info!(parent: request, subject, payload_len, "API request");
    }

    /// Expected traffic: logged informationally, span status untouched.
    pub fn caller_error(&self, stage: &Span, err: &dyn Display) {
        tracing::info!(parent: stage, error = %err, "caller error");
    }

    /// Anomaly: logged as a failure and marks both spans as errored.
    pub fn system_error(&self, request: &Span, stage: &Span, err: &dyn Display) {
        tracing::error!(parent: stage, error = %err, "system error");
        for span in [request, stage] {
            span.record("otel.status_code", "ERROR");
            span.record("error", display(err));
        }
    }
}
