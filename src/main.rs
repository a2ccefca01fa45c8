#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # modemtel
//!
//! Telemetry parser for Quectel-style cellular modems.
//!
//! Takes the raw text a modem returns for a batched AT request and turns it
//! into a structured LTE/NR signal snapshot, or decodes an SMS listing.
//!
//! ## Subcommands
//!
//! - `modemtel serve`: run the HTTP API
//! - `modemtel parse`: parse a blob from a file or stdin and print JSON
//!
//! ## API surface
//!
//! | Method | Path             | Description                              |
//! |--------|------------------|------------------------------------------|
//! | GET    | `/api/health`    | Liveness probe and parse counters        |
//! | POST   | `/api/telemetry` | Batched AT response → telemetry snapshot |
//! | POST   | `/api/sms`       | `+CMGL` listing → SMS inbox              |
//!
//! ## Architecture
//!
//! ```text
//! main.rs          entry point, clap subcommands, graceful shutdown
//! config.rs        TOML + env-var configuration
//! error.rs         TelemetryError, ConfigError
//! state.rs         AppState, parse counters
//! sms.rs           +CMGL listing decode
//! routes/
//!   health.rs      GET /api/health
//!   telemetry.rs   POST /api/telemetry
//!   sms.rs         POST /api/sms
//! telemetry/
//!   classifier.rs  line splitting and echo context
//!   encoding.rs    UCS-2 / UTF-8 hex detection
//!   identifier.rs  cell ID / TAC normalization
//!   carrier.rs     carrier entry builder (+QENG, +QCAINFO, +QRSRP...)
//!   antenna.rs     logical → physical antenna port tables
//!   metrics.rs     dBm → percentage curves, assessment
//!   fields.rs      SIM, identity, operator, network info
//!   mod.rs         TelemetrySnapshot façade
//! ```

use std::io::Read;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};

use modemtel::{routes, sms, telemetry, AppState, Config};

/// Telemetry parser for Quectel-style cellular modems.
#[derive(Parser)]
#[command(name = "modemtel", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
    /// Parse one response blob and print JSON.
    Parse {
        /// Read the blob from this file instead of stdin.
        #[arg(long)]
        file: Option<String>,
        /// Treat the blob as an SMS listing.
        #[arg(long)]
        sms: bool,
        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Parse {
            file,
            sms,
            pretty,
            config,
        }) => run_parse(config.as_deref(), file.as_deref(), sms, pretty),
        Some(Commands::Serve { config }) => run_server(config.as_deref()).await,
        None => run_server(None).await,
    }
}

/// Load config and initialize tracing. RUST_LOG wins over `logging.level`.
fn init(config_path: Option<&str>) -> Option<Config> {
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("modemtel: {e}");
            return None;
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    // Logs go to stderr so `parse` output stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();
    Some(config)
}

fn run_parse(config_path: Option<&str>, file: Option<&str>, sms_mode: bool, pretty: bool) -> ExitCode {
    let Some(config) = init(config_path) else {
        return ExitCode::FAILURE;
    };

    let blob = match read_blob(file) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read input: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = if sms_mode {
        sms::parse_messages_with(&blob, &config.parser).map(|inbox| to_json(&inbox, pretty))
    } else {
        telemetry::parse_telemetry_with(&blob, &config.parser).map(|snap| to_json(&snap, pretty))
    };

    match rendered {
        Ok(Ok(json)) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!("Failed to serialize output: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn read_blob(file: Option<&str>) -> std::io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

async fn run_server(config_path: Option<&str>) -> ExitCode {
    let Some(config) = init(config_path) else {
        return ExitCode::FAILURE;
    };

    info!("modemtel v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);

    let state = AppState::new(config);
    let app = routes::router(state.clone());

    let listener = match TcpListener::bind(&state.config.server.listen).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {e}", state.config.server.listen);
            return ExitCode::FAILURE;
        }
    };

    info!("Server ready");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Goodbye");
    ExitCode::SUCCESS
}

/// Resolve on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                error!("Failed to register SIGTERM: {e}");
                ctrl_c.await.ok();
                info!("Received SIGINT");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}
