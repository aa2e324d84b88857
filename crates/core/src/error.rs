//! Error model for the API contract.

use thiserror::Error;

/// Result type used when loading an OpenAPI document.
pub type SpecResult<T> = Result<T, SpecError>;

/// Failure to load or interpret an OpenAPI document.
///
/// These are startup errors: a server that cannot load its document refuses
/// to start.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The document could not be read from disk.
    #[error("failed to read OpenAPI document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON or does not have the OpenAPI shape.
    #[error("failed to parse OpenAPI document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The `openapi` version field is not a supported 3.x version.
    #[error("unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),

    /// A `$ref` points at something the document does not define.
    #[error("unresolved reference: {0}")]
    UnresolvedRef(String),
}

impl SpecError {
    pub fn unresolved(reference: impl Into<String>) -> Self {
        Self::UnresolvedRef(reference.into())
    }
}

/// A single schema mismatch, located by JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// JSON pointer to the offending value (`""` for the document root).
    pub pointer: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }
}

impl core::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.pointer.is_empty() {
            f.write_str(&self.reason)
        } else {
            write!(f, "{} (at {})", self.reason, self.pointer)
        }
    }
}

impl std::error::Error for SchemaError {}

/// Per-request validation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No path template in the document matches the request path.
    #[error("no matching operation was found")]
    RouteNotFound,

    /// The path exists but does not declare this method.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// A required parameter is absent.
    #[error("parameter \"{name}\" in {location} is required")]
    MissingParameter { name: String, location: String },

    /// A parameter is present but does not match its schema.
    #[error("parameter \"{name}\" in {location} has an error: {reason}")]
    InvalidParameter {
        name: String,
        location: String,
        reason: String,
    },

    /// The operation requires a body and none was sent.
    #[error("request body has an error: value is required but missing")]
    MissingBody,

    /// The Content-Type header is missing or not declared by the operation.
    #[error("header Content-Type has unexpected value: {0:?}")]
    UnsupportedMediaType(String),

    /// The body could not be decoded as JSON.
    #[error("request body has an error: failed to decode request body: {0}")]
    Decode(String),

    /// The decoded body does not conform to the request schema.
    #[error("request body has an error: doesn't match schema: {0}")]
    Schema(SchemaError),

    /// The document itself is inconsistent for this operation.
    #[error("invalid OpenAPI document: {0}")]
    Document(String),
}

impl ValidationError {
    pub fn missing_parameter(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self::MissingParameter {
            name: name.into(),
            location: location.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether the failure is a problem with the request (as opposed to routing
    /// or the document).
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. }
                | Self::InvalidParameter { .. }
                | Self::MissingBody
                | Self::UnsupportedMediaType(_)
                | Self::Decode(_)
                | Self::Schema(_)
        )
    }
}

impl From<SchemaError> for ValidationError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}
