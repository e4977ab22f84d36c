//! Standardized span constructors.

/// Spans for the relay's units of work.
pub mod spans {
    use tracing::{Span, info_span};

    /// One message on its way to the sink.
    pub fn delivery(channel_id: i64, message_id: i64) -> Span {
        info_span!("delivery", channel_id, message_id)
    }

    /// One reconciliation cycle.
    pub fn reconcile(replica: &str) -> Span {
        info_span!("reconcile", replica = %replica)
    }

    /// One control-plane request.
    pub fn request(method: &str, path: &str) -> Span {
        info_span!("request", method = %method, path = %path)
    }
}
