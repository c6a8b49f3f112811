use crate::record::LogEvent;
use crate::sink::Sink;
use async_trait::async_trait;

/// A sink that drops every event.
///
/// Substituted for the reporter when reporting is disabled or no token is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl Sink for NoopSink {
    async fn handle(&self, _event: &LogEvent) {}

    fn is_handling(&self, _event: &LogEvent) -> bool {
        false
    }
}
