use crate::builder::ReportBuilder;
use crate::context::HostContext;
use crate::level::Level;
use crate::record::LogEvent;
use crate::report::ErrorReport;
use crate::sink::Sink;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Path appended to the endpoint base URL.
pub const COLLECT_PATH: &str = "/errors/collect";

/// Header carrying the API token.
pub const TOKEN_HEADER: &str = "X-Analytics-Token";

/// Timeout for automatic reporting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for manual diagnostic sends.
pub const DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(10);

/// Successful (2xx) response from the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub status: u16,
    pub body: String,
}

/// Reasons a report could not be delivered.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server returned HTTP {status}")]
    Status { status: u16, body: String },
}

/// `endpoint` with trailing slashes removed, followed by [`COLLECT_PATH`].
pub fn collect_url(endpoint: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), COLLECT_PATH)
}

/// Sink that posts an [`ErrorReport`] for every event at or above its
/// level.
///
/// Each qualifying event gets exactly one POST attempt, bounded by the
/// configured timeout. Failures are dropped; `handle` always returns
/// normally.
#[derive(Clone)]
pub struct Reporter {
    client: Client,
    token: String,
    url: String,
    builder: ReportBuilder,
    level: Level,
    bubble: bool,
    timeout: Duration,
}

impl Reporter {
    /// Create a reporter with level `Error`, bubbling enabled and a 5s
    /// timeout.
    ///
    /// The token is sent as-is; tokens normally start with `ak_` but this
    /// is not checked here.
    pub fn new(
        token: impl Into<String>,
        endpoint: &str,
        site_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Reporter {
            client: Client::new(),
            token: token.into(),
            url: collect_url(endpoint),
            builder: ReportBuilder::new(site_id, environment),
            level: Level::Error,
            bubble: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_bubble(mut self, bubble: bool) -> Self {
        self.bubble = bubble;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_context(mut self, context: Arc<dyn HostContext>) -> Self {
        self.builder = self.builder.with_context(context);
        self
    }

    /// Full POST target, e.g. `https://collector.test/errors/collect`.
    pub fn collect_url(&self) -> &str {
        &self.url
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn builder(&self) -> &ReportBuilder {
        &self.builder
    }

    /// Serialize `report` and POST it to the collector.
    ///
    /// Any non-2xx status is returned as [`DeliveryError::Status`] with the
    /// response body attached.
    pub async fn send(&self, report: &ErrorReport, timeout: Duration) -> Result<Delivery, DeliveryError> {
        let body = serde_json::to_vec(report)?;

        let resp = self
            .client
            .post(&self.url)
            .header(TOKEN_HEADER, &self.token)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(Delivery {
                status: status.as_u16(),
                body: text,
            })
        } else {
            Err(DeliveryError::Status {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout(timeout)
    } else {
        DeliveryError::Transport(err)
    }
}

#[async_trait]
impl Sink for Reporter {
    async fn handle(&self, event: &LogEvent) {
        if !self.is_handling(event) {
            return;
        }

        let report = match catch_unwind(AssertUnwindSafe(|| self.builder.build(event))) {
            Ok(report) => report,
            Err(_) => {
                debug!("error report could not be built, dropping event");
                return;
            }
        };

        // Recorded under this crate's target, which the reporting layer
        // ignores.
        if let Err(e) = self.send(&report, self.timeout).await {
            debug!(error = %e, url = %self.url, "error report delivery failed");
        }
    }

    fn is_handling(&self, event: &LogEvent) -> bool {
        event.level >= self.level
    }

    fn bubbles(&self) -> bool {
        self.bubble
    }
}
