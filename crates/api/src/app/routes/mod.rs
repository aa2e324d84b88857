use std::sync::Arc;

use axum::Router;

pub mod echo;
pub mod system;

/// Router for the operations described by the OpenAPI document.
pub fn router<A: echo::EchoApi>(api: Arc<A>) -> Router {
    Router::new().merge(echo::router(api))
}
