use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use http_body_util::LengthLimitError;

use echoapi_core::{RequestInput, RequestValidator};

use crate::app::errors;
use crate::config::ServerConfig;
use crate::context::{RequestId, REQUEST_ID_HEADER};

/// Longest client-supplied request id we accept verbatim.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Decides which requests bypass OpenAPI validation.
#[derive(Debug, Clone)]
pub struct Skipper {
    paths: Arc<[String]>,
}

impl Skipper {
    pub fn new(paths: impl IntoIterator<Item = String>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn skips(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

#[derive(Clone)]
pub struct ValidationState {
    pub validator: Arc<RequestValidator>,
    pub skipper: Skipper,
    pub max_body_bytes: usize,
}

impl ValidationState {
    pub fn new(validator: RequestValidator, config: &ServerConfig) -> Self {
        Self {
            validator: Arc::new(validator),
            skipper: Skipper::new(config.skip_paths.iter().cloned()),
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Reject requests that do not conform to the OpenAPI document.
///
/// The body is buffered (up to `max_body_bytes`), validated, and handed on
/// unchanged to the handler.
pub async fn openapi_validation(
    State(state): State<ValidationState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.skipper.skips(req.uri().path()) {
        return next.run(req).await;
    }

    if declared_length(&req).is_some_and(|len| len > state.max_body_bytes) {
        return errors::body_too_large(state.max_body_bytes);
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) if exceeds_length_limit(&e) => {
            return errors::body_too_large(state.max_body_bytes);
        }
        Err(e) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                format!("failed to read request body: {e}"),
            );
        }
    };

    let outcome = {
        let headers: Vec<(&str, &[u8])> = parts
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        let input = RequestInput {
            method: parts.method.as_str(),
            path: parts.uri.path(),
            query: parts.uri.query(),
            headers: &headers,
            content_type: parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            body: &bytes,
        };
        state.validator.validate(&input)
    };

    if let Err(err) = outcome {
        tracing::debug!(
            method = %parts.method,
            path = %parts.uri.path(),
            error = %err,
            "request rejected by OpenAPI validation"
        );
        return errors::validation_error_to_response(&err);
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Attach a [`RequestId`] to the request and echo it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(RequestId::new)
        .unwrap_or_else(RequestId::generate);

    req.extensions_mut().insert(id.clone());
    let mut res = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

/// Chunked bodies carry no `Content-Length`; the limit trips while reading.
fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn declared_length(req: &Request<Body>) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipper_matches_exact_paths_only() {
        let skipper = Skipper::new(["/health".to_string()]);
        assert!(skipper.skips("/health"));
        assert!(!skipper.skips("/health/live"));
        assert!(!skipper.skips("/echo"));
    }
}
