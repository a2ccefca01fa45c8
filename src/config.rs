//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables**: `MODEMTEL_LISTEN`, `MODEMTEL_ECHO_PREFIX`
//!    (and `RUST_LOG`, which overrides `logging.level` at startup)
//! 2. **Config file**: path via `--config <path>`, or `modemtel.toml` in CWD
//! 3. **Compiled defaults**: see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8686"
//! max_body_bytes = 65536   # 64 KB, AT transcripts are small
//!
//! [logging]
//! level = "info"
//!
//! [parser]
//! echo_prefix = "AT"
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "modemtel.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

/// HTTP server settings for `modemtel serve`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8686`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum request body accepted by the parse endpoints (default 64 KB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Response interpretation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParserConfig {
    /// Prefix that marks a command-echo line (default `AT`).
    #[serde(default = "default_echo_prefix")]
    pub echo_prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:8686".to_string()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_echo_prefix() -> String {
    "AT".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            echo_prefix: default_echo_prefix(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file. Otherwise looks for
    /// `modemtel.toml` in the current directory, falling back to compiled
    /// defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Config::default(),
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("MODEMTEL_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(prefix) = std::env::var("MODEMTEL_ECHO_PREFIX") {
            if !prefix.trim().is_empty() {
                config.parser.echo_prefix = prefix.trim().to_string();
            }
        }

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(path, &content)
    }

    fn from_toml(path: &str, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }
}
