#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! modemtel library: interprets the text a Quectel-style cellular modem
//! returns for batched AT requests.
//!
//! This library exposes:
//! - `telemetry`: batched response → [`telemetry::TelemetrySnapshot`]
//! - `sms`: `+CMGL` listing → [`sms::SmsInbox`]
//! - `config`: configuration loading
//! - `routes`: HTTP handlers for `modemtel serve`

pub mod config;
pub mod error;
pub mod routes;
pub mod sms;
pub mod state;
pub mod telemetry;

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use error::{ConfigError, TelemetryError};
pub use sms::{parse_messages, SmsInbox, SmsMessage};
pub use state::AppState;
pub use telemetry::{parse_telemetry, parse_telemetry_with, TelemetrySnapshot};
