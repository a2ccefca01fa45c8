//! HTTP route handlers.
//!
//! The parse endpoints take the raw modem response as a `text/plain` body
//! and answer with JSON. Nothing is authenticated; the server is meant to
//! sit next to the console on the device's LAN.

pub mod health;
pub mod sms;
pub mod telemetry;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/telemetry", post(telemetry::parse))
        .route("/api/sms", post(sms::parse))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_support::call;
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_body_limit() {
        let mut config = Config::default();
        config.server.max_body_bytes = 16;
        let app = router(AppState::new(config));
        let (status, _) = call(app, "POST", "/api/telemetry", &"+CSQ: 20,99\r\n".repeat(4)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = router(AppState::new(Config::default()));
        let (status, _) = call(app, "GET", "/api/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
