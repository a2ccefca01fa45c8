//! Health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// `GET /api/health`: liveness probe.
///
/// Returns status, uptime, version and the parse counters.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "echo_prefix": state.config.parser.echo_prefix,
        "stats": state.stats.to_json(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::routes::{router, test_support::call};
    use crate::AppState;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_counters() {
        let state = AppState::new(Config::default());
        let app = router(state.clone());

        let (status, _) = call(app.clone(), "POST", "/api/telemetry", "OK").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(app, "GET", "/api/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["stats"]["telemetry_parses"], 1);
        assert_eq!(body["stats"]["empty_responses"], 1);
    }
}
