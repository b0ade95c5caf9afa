//! Best-effort audit recording.

use std::sync::Arc;

use hangar_core::{audit::NewAuditEvent, store::AuditSink};

/// Wraps an [`AuditSink`] so that a failed append never fails the operation
/// being audited. Failures are logged and dropped.
pub(crate) struct BestEffortAudit<A> {
  sink: Arc<A>,
}

impl<A> Clone for BestEffortAudit<A> {
  fn clone(&self) -> Self { Self { sink: Arc::clone(&self.sink) } }
}

impl<A: AuditSink> BestEffortAudit<A> {
  pub(crate) fn new(sink: Arc<A>) -> Self { Self { sink } }

  pub(crate) async fn record(&self, event: NewAuditEvent) {
    let event_type = event.event_type;
    if let Err(e) = self.sink.append_audit(event).await {
      tracing::warn!(%event_type, error = %e, "failed to append audit event");
    }
  }
}
