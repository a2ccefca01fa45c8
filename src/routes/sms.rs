//! SMS listing parse endpoint.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::sms::{self, SmsInbox};
use crate::AppState;

/// `POST /api/sms`: parse an `AT+CSCA?;+CMGL="ALL"` response.
///
/// # Errors
///
/// - `502 Bad Gateway` with `{"code":"MODEM_ERROR"}`: the response carried
///   the modem's error token
pub async fn parse(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<SmsInbox>, (StatusCode, Json<Value>)> {
    let result = sms::parse_messages_with(&body, &state.config.parser);
    state.stats.record_sms(&result);

    result.map(Json).map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string(), "code": e.code()})),
        )
    })
}
