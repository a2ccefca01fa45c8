//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::TelemetryError;
use crate::telemetry::{SnapshotStatus, TelemetrySnapshot};

/// Shared application state for the modemtel server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Parse counters reported by `/api/health`.
    pub stats: Arc<ParseStats>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            stats: Arc::new(ParseStats::new()),
        }
    }
}

/// Process-wide parse counters. The parsers themselves stay stateless.
#[derive(Debug, Default)]
pub struct ParseStats {
    pub telemetry_parses: AtomicU64,
    pub sms_parses: AtomicU64,
    pub empty_responses: AtomicU64,
    pub modem_errors: AtomicU64,
}

impl ParseStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one telemetry parse by outcome.
    pub fn record_telemetry(&self, result: &Result<TelemetrySnapshot, TelemetryError>) {
        self.telemetry_parses.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(s) if s.status == SnapshotStatus::EmptyResponse => {
                self.empty_responses.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(_) => {
                self.modem_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Count one SMS listing parse.
    pub fn record_sms<T>(&self, result: &Result<T, TelemetryError>) {
        self.sms_parses.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.modem_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "telemetry_parses": self.telemetry_parses.load(Ordering::Relaxed),
            "sms_parses": self.sms_parses.load(Ordering::Relaxed),
            "empty_responses": self.empty_responses.load(Ordering::Relaxed),
            "modem_errors": self.modem_errors.load(Ordering::Relaxed),
        })
    }
}
