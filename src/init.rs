use crate::layer::{ReportHandle, ReportLayer, DEFAULT_MAX_IN_FLIGHT};
use crate::sink::Sink;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the subscriber installed by [`init_tracing_with_config`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to [`ReportLayer`] so events are also printed to the
///   console.
/// - `max_in_flight`: deliveries allowed to run at once; events past the
///   bound are dropped and counted on the [`ReportHandle`].
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub enable_stdout: bool,
    pub max_in_flight: usize,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Build the layer installed by [`init_tracing_with_config`].
///
/// When called inside a Tokio runtime the layer is bound to it, so events
/// logged later from plain `std::thread`s are still delivered there.
pub fn report_layer(sink: Arc<dyn Sink>, config: &LayerConfig) -> ReportLayer {
    let layer = ReportLayer::new(sink).with_max_in_flight(config.max_in_flight);
    match Handle::try_current() {
        Ok(handle) => layer.with_runtime(handle),
        Err(_) => layer,
    }
}

/// Install a global `tracing` subscriber that reports events through
/// `sink`.
///
/// **Parameters**
/// - `sink`: the [`Sink`] receiving every qualifying event, usually from
///   [`make_sink`](crate::driver::make_sink).
/// - `config`: [`LayerConfig`] controlling console output and the
///   delivery bound.
///
/// **Returns**
/// - a [`ReportHandle`] to wait for pending deliveries before exit;
/// - `Err(..)` if a global subscriber was already installed.
pub fn init_tracing_with_config(
    sink: Arc<dyn Sink>,
    config: LayerConfig,
) -> Result<ReportHandle, SetGlobalDefaultError> {
    let layer = report_layer(sink, &config);
    let handle = layer.handle();

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(handle)
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn Sink>) -> Result<ReportHandle, SetGlobalDefaultError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
