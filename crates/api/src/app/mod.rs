//! HTTP application wiring (Axum router + middleware).
//!
//! - `routes/`: HTTP routes + handlers (one file per API area)
//! - `extract.rs`: JSON extractor with JSON error bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use echoapi_core::{OpenApiDocument, RequestValidator};

use crate::config::ServerConfig;
use crate::context::RequestId;
use crate::middleware;

pub mod errors;
pub mod extract;
pub mod routes;

/// Build the full HTTP router with the stock echo implementation.
pub fn build_app(config: &ServerConfig, document: OpenApiDocument) -> Router {
    build_app_with(config, document, Arc::new(routes::echo::EchoServer))
}

/// Build the full HTTP router around a custom [`routes::echo::EchoApi`].
pub fn build_app_with<A: routes::echo::EchoApi>(
    config: &ServerConfig,
    document: OpenApiDocument,
    api: Arc<A>,
) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(api))
        .fallback(routes::system::not_found);

    if config.validate_requests {
        let state = middleware::ValidationState::new(RequestValidator::new(document), config);
        app = app.layer(axum::middleware::from_fn_with_state(
            state,
            middleware::openapi_validation,
        ));
    } else {
        tracing::warn!("OpenAPI request validation is disabled");
    }

    app.layer(DefaultBodyLimit::max(config.max_body_bytes)).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::request_id))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.as_str().to_owned())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %request_id,
                )
            })),
    )
}
