use serde::Serialize;
use serde::de::DeserializeOwned;

/// A domain notification.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **JSON on the wire** (serde both ways)
/// - bound to exactly one bus subject
pub trait Event: Serialize + DeserializeOwned + Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable bus subject for this event type (e.g. "events.low_stock").
    const SUBJECT: &'static str;
}
