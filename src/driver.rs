use std::sync::Arc;

use crate::config::AnalyticsConfig;
use crate::level::Level;
use crate::noop_sink::NoopSink;
use crate::reporter::Reporter;
use crate::sink::Sink;

/// Create the sink described by `config`.
///
/// Returns a [`NoopSink`] when reporting is disabled or no token is set,
/// otherwise a [`Reporter`] gated at `config.level`.
pub fn make_sink(config: &AnalyticsConfig) -> Arc<dyn Sink> {
    make_sink_with_level(config, None)
}

/// Like [`make_sink`], with a per-channel level that takes precedence
/// over `config.level`.
pub fn make_sink_with_level(config: &AnalyticsConfig, level: Option<Level>) -> Arc<dyn Sink> {
    if !config.is_active() {
        return Arc::new(NoopSink);
    }

    let reporter = Reporter::new(
        config.token.clone(),
        &config.endpoint,
        config.site_id.clone(),
        config.environment.clone(),
    )
    .with_level(level.unwrap_or(config.level));

    Arc::new(reporter)
}
