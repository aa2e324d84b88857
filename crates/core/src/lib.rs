//! `echoapi-core` — the echo API contract.
//!
//! Holds the OpenAPI document the server is built from, the payload types it
//! describes, and the request validator that enforces it. Nothing here knows
//! about HTTP frameworks.

pub mod error;
pub mod message;
pub mod openapi;
pub mod schema;
pub mod validation;

pub use error::{SchemaError, SpecError, SpecResult, ValidationError};
pub use message::{EchoRequest, EchoResponse};
pub use openapi::OpenApiDocument;
pub use schema::SchemaValidator;
pub use validation::{RequestInput, RequestValidator};
