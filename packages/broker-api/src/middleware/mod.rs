//! Middleware: rate limiting and panic handling.

pub mod rate_limit;

pub use rate_limit::{RateLimitConfig, RateLimitLayer};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

/// Builds a `CatchPanicLayer` that reports panics in the same envelope
/// shape as `BrokerError`, instead of axum's default plaintext 500.
pub fn create_panic_handler(
) -> tower_http::catch_panic::CatchPanicLayer<fn(Box<dyn std::any::Any + Send + 'static>) -> Response> {
    tower_http::catch_panic::CatchPanicLayer::custom(handle_panic)
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let panic_message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };

    error!(
        request_id = %request_id,
        panic_message = %panic_message,
        audit = true,
        "server panic occurred"
    );

    let body = json!({
        "success": false,
        "error": {
            "code": "INTERNAL_ERROR",
            "message": "An internal server error occurred",
        },
        "request_id": request_id,
    });

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
