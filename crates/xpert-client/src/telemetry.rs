use tracing::info;
use xpert_core::telemetry::TelemetryEvent;
use xpert_core::ConversationId;

/// Fire-and-forget destination for analytics. Implementations must not block
/// and never report failure back to the session.
pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: &TelemetryEvent);

    fn survey_requested(&self, _conversation_id: ConversationId) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn track(&self, event: &TelemetryEvent) {
        info!(
            event = event.name(),
            conversation_id = %event.conversation_id(),
            properties = %event.properties(),
            "telemetry"
        );
    }

    fn survey_requested(&self, conversation_id: ConversationId) {
        info!(%conversation_id, "post-chat survey requested");
    }
}
