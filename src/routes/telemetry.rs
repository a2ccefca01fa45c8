//! Telemetry parse endpoint.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::telemetry::{self, TelemetrySnapshot};
use crate::AppState;

/// `POST /api/telemetry`: parse a batched AT response.
///
/// The body is the raw response text. Empty or acknowledgement-only bodies
/// return a snapshot with `"status": "empty_response"`.
///
/// # Errors
///
/// - `502 Bad Gateway` with `{"code":"MODEM_ERROR"}`: the response carried
///   the modem's error token
pub async fn parse(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<TelemetrySnapshot>, (StatusCode, Json<Value>)> {
    let result = telemetry::parse_telemetry_with(&body, &state.config.parser);
    state.stats.record_telemetry(&result);

    result.map(Json).map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string(), "code": e.code()})),
        )
    })
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::routes::{router, test_support::call};
    use crate::AppState;
    use axum::http::StatusCode;

    const BLOB: &str = "AT+QUIMSLOT?;+QENG=\"servingcell\"\r\n\
        +QUIMSLOT: 1\r\n\
        +QENG: \"servingcell\",\"NOCONN\",\"LTE\",\"FDD\",302,720,101A901,266,2050,4,5,5,61E4,-102,-11,-70,10,-\r\n\
        OK\r\n";

    #[tokio::test]
    async fn test_parse_snapshot() {
        let app = router(AppState::new(Config::default()));
        let (status, body) = call(app, "POST", "/api/telemetry", BLOB).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_sim"], "SIM 1");
        assert_eq!(body["network_type"], "LTE");
        assert_eq!(body["entries"][0]["id"], "lte-pcc");
        assert_eq!(body["entries"][0]["band"], "B4");
        assert_eq!(body["cell_id"]["hex"], "101A901");
    }

    #[tokio::test]
    async fn test_empty_body() {
        let app = router(AppState::new(Config::default()));
        let (status, body) = call(app, "POST", "/api/telemetry", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "empty_response");
        assert_eq!(body["signal_assessment"], "unknown");
    }

    #[tokio::test]
    async fn test_modem_error_is_bad_gateway() {
        let state = AppState::new(Config::default());
        let app = router(state.clone());
        let (status, body) = call(app, "POST", "/api/telemetry", "AT+QENG\r\n+CME ERROR: 3\r\n").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "MODEM_ERROR");
        assert_eq!(body["error"], "modem returned error: +CME ERROR: 3");
        assert_eq!(
            state.stats.modem_errors.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
