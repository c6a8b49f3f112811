//! Environment variable names read by [`AnalyticsConfig::from_env`](crate::config::AnalyticsConfig::from_env).
//!
//! These are purely helpers; the reporter itself never reads the
//! environment.

/// API token sent in the `X-Analytics-Token` header.
pub const ANALYTICS_TOKEN_ENV: &str = "ANALYTICS_TOKEN";

/// Site identifier added to every report's tags.
pub const ANALYTICS_SITE_ID_ENV: &str = "ANALYTICS_SITE_ID";

/// Environment name sent with reports.
pub const ANALYTICS_ENVIRONMENT_ENV: &str = "ANALYTICS_ENVIRONMENT";

/// Fallback for [`ANALYTICS_ENVIRONMENT_ENV`].
pub const APP_ENV_ENV: &str = "APP_ENV";

/// Kill switch, `false`/`0`/`off`/`no` disables reporting.
pub const ANALYTICS_ENABLED_ENV: &str = "ANALYTICS_ENABLED";

/// Minimum level name, e.g. `error` or `warning`.
pub const ANALYTICS_LOG_LEVEL_ENV: &str = "ANALYTICS_LOG_LEVEL";

/// Base URL of the collection server.
pub const ANALYTICS_ENDPOINT_ENV: &str = "ANALYTICS_ENDPOINT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
