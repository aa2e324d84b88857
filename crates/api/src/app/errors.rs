use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use echoapi_core::ValidationError;

/// Failure reported by an [`crate::app::routes::echo::EchoApi`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "handler failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}

pub fn validation_error_to_response(err: &ValidationError) -> Response {
    match err {
        ValidationError::RouteNotFound => json_error(StatusCode::NOT_FOUND, "route_not_found", err.to_string()),
        ValidationError::MethodNotAllowed => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", err.to_string())
        }
        ValidationError::Document(_) => {
            tracing::error!(error = %err, "OpenAPI document cannot validate this request");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invalid_document", err.to_string())
        }
        _ => json_error(StatusCode::BAD_REQUEST, "invalid_request", err.to_string()),
    }
}

/// Map a failed JSON binding to an error body with a `message` field.
pub fn json_rejection_to_response(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    json_error(status, code_for_status(status), rejection.body_text())
}

pub fn body_too_large(limit: usize) -> Response {
    json_error(
        StatusCode::PAYLOAD_TOO_LARGE,
        "payload_too_large",
        format!("request body exceeds {limit} bytes"),
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn code_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNPROCESSABLE_ENTITY => "unprocessable_entity",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        s if s.is_server_error() => "internal_error",
        _ => "bad_request",
    }
}
