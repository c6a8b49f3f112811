use crate::env::*;
use crate::level::{Level, ParseLevelError};

/// Collection server used when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "https://analytics.stacks.com";

/// Environment name used when neither variable is set.
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Settings consumed by [`make_sink`](crate::driver::make_sink) and the
/// diagnostic sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsConfig {
    /// API token. Reporting is off while it is empty.
    pub token: String,
    pub site_id: String,
    pub environment: String,
    /// Kill switch.
    pub enabled: bool,
    /// Minimum level that produces a report.
    pub level: Level,
    /// Base URL of the collection server.
    pub endpoint: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            token: String::new(),
            site_id: String::new(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            enabled: true,
            level: Level::Error,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Error returned when a configuration value cannot be interpreted.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid {var}: {source}")]
    Level {
        var: &'static str,
        #[source]
        source: ParseLevelError,
    },

    #[error("invalid {var}: expected a boolean, got {value:?}")]
    Bool { var: &'static str, value: String },
}

impl AnalyticsConfig {
    /// Read the configuration from the `ANALYTICS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = std::env::var(ANALYTICS_ENVIRONMENT_ENV)
            .unwrap_or_else(|_| env_or(APP_ENV_ENV, DEFAULT_ENVIRONMENT));

        let enabled = match std::env::var(ANALYTICS_ENABLED_ENV) {
            Ok(value) => parse_bool(&value).ok_or(ConfigError::Bool {
                var: ANALYTICS_ENABLED_ENV,
                value,
            })?,
            Err(_) => true,
        };

        let level = env_or(ANALYTICS_LOG_LEVEL_ENV, "error")
            .parse()
            .map_err(|source| ConfigError::Level {
                var: ANALYTICS_LOG_LEVEL_ENV,
                source,
            })?;

        Ok(AnalyticsConfig {
            token: env_or(ANALYTICS_TOKEN_ENV, ""),
            site_id: env_or(ANALYTICS_SITE_ID_ENV, ""),
            environment,
            enabled,
            level,
            endpoint: env_or(ANALYTICS_ENDPOINT_ENV, DEFAULT_ENDPOINT),
        })
    }

    /// Whether delivery can happen at all: enabled and a token is set.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.token.is_empty()
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
