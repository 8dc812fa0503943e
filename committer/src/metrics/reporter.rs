use super::MetricEvent;

/// Receives [`MetricEvent`]s as commit and abort attempts progress, e.g. to forward them to a
/// monitoring system.
pub trait MetricsReporter: Send + Sync + std::fmt::Debug {
    fn report(&self, event: MetricEvent);
}
