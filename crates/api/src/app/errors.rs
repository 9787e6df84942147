use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use bazaar_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::NotFoundOrUnauthorized => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::InvalidTransition(t) => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "invalid_transition",
                "message": t.to_string(),
                "current": t.current,
                "requested": t.requested,
                "reason": t.reason,
            })),
        )
            .into_response(),
        ServiceError::InsufficientStock(lines) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!("insufficient stock for {} variant(s)", lines.len()),
                "lines": lines,
            })),
        )
            .into_response(),
        ServiceError::ValidationFailure(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::ConcurrencyConflict(msg) => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "conflict",
                "message": msg,
                "retryable": true,
            })),
        )
            .into_response(),
        ServiceError::Fatal(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path id, or answer 400.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
