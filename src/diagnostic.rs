//! Manual sending of sample reports, used to verify an integration.
//!
//! Unlike the automatic path, every failure here is returned to the
//! caller, including the collector's status code and response body.

use crate::config::AnalyticsConfig;
use crate::context::HostContext;
use crate::level::Level;
use crate::record::{ExceptionInfo, LogEvent};
use crate::report::ErrorReport;
use crate::reporter::{Delivery, DeliveryError, Reporter, DIAGNOSTIC_TIMEOUT};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Channel recorded in the `log_channel` tag of sample reports.
pub const SAMPLE_CHANNEL: &str = "error-report-test";

/// Kind of sample report to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SampleKind {
    /// A captured error with stack trace.
    #[default]
    Exception,
    /// A plain `Error` level message.
    Error,
    /// A plain `Warning` level message.
    Warning,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SampleKind::Exception => "exception",
            SampleKind::Error => "error",
            SampleKind::Warning => "warning",
        })
    }
}

impl FromStr for SampleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exception" => Ok(SampleKind::Exception),
            "error" => Ok(SampleKind::Error),
            "warning" => Ok(SampleKind::Warning),
            other => Err(format!("unknown sample kind: {other}")),
        }
    }
}

/// Error type attached to exception samples.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RuntimeError(pub String);

#[derive(thiserror::Error, Debug)]
pub enum DiagnosticError {
    #[error("error reporting is disabled; set ANALYTICS_ENABLED=true")]
    Disabled,

    #[error("no API token configured; set ANALYTICS_TOKEN")]
    MissingToken,

    #[error("no site ID configured; set ANALYTICS_SITE_ID")]
    MissingSiteId,

    #[error("failed to send: {0}")]
    Delivery(#[from] DeliveryError),
}

/// A sample that the collector accepted.
#[derive(Debug, Clone)]
pub struct SampleDelivery {
    pub report: ErrorReport,
    pub delivery: Delivery,
}

/// Every configuration problem that prevents a send, in the order
/// enabled, token, site ID.
pub fn config_problems(config: &AnalyticsConfig) -> Vec<DiagnosticError> {
    let mut problems = Vec::new();
    if !config.enabled {
        problems.push(DiagnosticError::Disabled);
    }
    if config.token.is_empty() {
        problems.push(DiagnosticError::MissingToken);
    }
    if config.site_id.is_empty() {
        problems.push(DiagnosticError::MissingSiteId);
    }
    problems
}

/// Tokens issued by the collector start with `ak_`.
pub fn token_has_expected_prefix(token: &str) -> bool {
    token.starts_with("ak_")
}

/// Token shortened to its first 8 characters for display.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "<not set>".to_string();
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}...")
}

/// Build the event for a sample of `kind`, using `message` when given.
pub fn sample_event(kind: SampleKind, message: Option<&str>) -> LogEvent {
    let event = match kind {
        SampleKind::Exception => {
            let message = message.unwrap_or("Sample RuntimeError from error-report-test");
            let err = RuntimeError(message.to_string());
            LogEvent::new(Level::Error, SAMPLE_CHANNEL, message).with_exception(ExceptionInfo::capture(&err))
        }
        SampleKind::Error => LogEvent::new(
            Level::Error,
            SAMPLE_CHANNEL,
            message.unwrap_or("This is a sample error from error-report-test"),
        ),
        SampleKind::Warning => LogEvent::new(
            Level::Warning,
            SAMPLE_CHANNEL,
            message.unwrap_or("This is a sample warning from error-report-test"),
        ),
    };

    event.with_tags([("sample", "true")])
}

/// Build a sample report and send it with the diagnostic timeout.
///
/// Configuration problems are returned before any request is made. The
/// sample is sent regardless of the configured minimum level.
pub async fn send_sample(
    config: &AnalyticsConfig,
    kind: SampleKind,
    message: Option<&str>,
    context: Arc<dyn HostContext>,
) -> Result<SampleDelivery, DiagnosticError> {
    if let Some(problem) = config_problems(config).into_iter().next() {
        return Err(problem);
    }

    let reporter = Reporter::new(
        config.token.clone(),
        &config.endpoint,
        config.site_id.clone(),
        config.environment.clone(),
    )
    .with_context(context);

    let report = reporter.builder().build(&sample_event(kind, message));
    let delivery = reporter.send(&report, DIAGNOSTIC_TIMEOUT).await?;

    Ok(SampleDelivery { report, delivery })
}
