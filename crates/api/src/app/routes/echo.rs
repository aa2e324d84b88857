use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::post, Router};

use echoapi_core::{EchoRequest, EchoResponse};

use crate::app::errors::ApiError;
use crate::app::extract::ApiJson;
use crate::context::RequestId;

/// Operations of the echo API. One method per OpenAPI operation.
#[async_trait::async_trait]
pub trait EchoApi: Send + Sync + 'static {
    /// `POST /echo` (`postEcho`).
    async fn post_echo(&self, request: EchoRequest) -> Result<EchoResponse, ApiError>;
}

/// The stock implementation: the response carries the request message.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoServer;

#[async_trait::async_trait]
impl EchoApi for EchoServer {
    async fn post_echo(&self, request: EchoRequest) -> Result<EchoResponse, ApiError> {
        Ok(EchoResponse::from(request))
    }
}

/// Register the echo operations backed by `api`.
pub fn router<A: EchoApi>(api: Arc<A>) -> Router {
    Router::new()
        .route("/echo", post(post_echo::<A>))
        .layer(Extension(api))
}

pub async fn post_echo<A: EchoApi>(
    Extension(api): Extension<Arc<A>>,
    request_id: Option<Extension<RequestId>>,
    ApiJson(body): ApiJson<EchoRequest>,
) -> axum::response::Response {
    tracing::debug!(
        request_id = request_id.as_ref().map(|Extension(id)| id.as_str()).unwrap_or("-"),
        message_len = body.message.len(),
        "echo"
    );

    match api.post_echo(body).await {
        Ok(response) => ApiJson(response).into_response(),
        Err(e) => e.into_response(),
    }
}
