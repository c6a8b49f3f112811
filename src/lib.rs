//! Error reporting for `tracing`.
//!
//! Events at or above a configured level are turned into fingerprinted
//! [`ErrorReport`](report::ErrorReport)s and posted to a collection
//! endpoint. Delivery is best effort: one attempt per event, bounded by a
//! timeout, with every failure absorbed so logging can never break the
//! application.
//!
//! ```no_run
//! use tracing_error_report::{config::AnalyticsConfig, driver::make_sink, init::init_tracing};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnalyticsConfig::from_env()?;
//! let reports = init_tracing(make_sink(&config))?;
//!
//! tracing::error!(target: "checkout", "payment provider unreachable");
//!
//! reports.shutdown(std::time::Duration::from_secs(5)).await;
//! # Ok(())
//! # }
//! ```

pub mod level;
pub mod record;
pub mod report;
pub mod context;
pub mod builder;
pub mod sink;
pub mod noop_sink;
pub mod reporter;

pub mod env;
pub mod config;
pub mod driver;

pub mod layer;
pub mod init;
pub mod diagnostic;
