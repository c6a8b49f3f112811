use std::error::Error;
use std::time::Duration;
use tracing::{error, info, warn};

use tracing_error_report::config::AnalyticsConfig;
use tracing_error_report::driver::make_sink;
use tracing_error_report::init::init_tracing;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct RuntimeError(String);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // ANALYTICS_TOKEN, ANALYTICS_SITE_ID and ANALYTICS_ENDPOINT select the
    // collector; without a token every event goes to a no-op sink.
    let config = AnalyticsConfig::from_env()?;
    let reports = init_tracing(make_sink(&config))?;

    info!("starting service");
    warn!("cache miss rate is high");

    let err = RuntimeError("DB connection lost".to_string());
    error!(
        error = &err as &(dyn Error + 'static),
        tags.user_id = 42,
        "could not load user"
    );

    error!(reason = "invalid password", "authentication failed");

    // Deliveries run on their own tasks; let them finish before the
    // runtime shuts down.
    if !reports.shutdown(Duration::from_secs(5)).await {
        eprintln!("some error reports were still pending at exit");
    }
    Ok(())
}
