//! Error types.
//!
//! Parsing is best-effort: malformed fields fall back to sentinels and never
//! surface here. The only hard failure for a telemetry or SMS blob is the
//! modem's own error token.

use thiserror::Error;

/// Hard failures reported by the telemetry and SMS parsers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// The blob contained `ERROR`, `+CME ERROR: n` or `+CMS ERROR: n`.
    #[error("modem returned error: {0}")]
    ModemError(String),
}

impl TelemetryError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModemError(_) => "MODEM_ERROR",
        }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
