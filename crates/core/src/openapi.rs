//! Typed OpenAPI 3.x document model.
//!
//! Only the parts needed to route and validate requests are modelled with
//! types. Schemas stay as raw JSON values and are interpreted by
//! [`crate::schema`].

use std::collections::BTreeMap;
use std::path::Path;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SpecError, SpecResult, ValidationError};

/// The echo API document shipped with this crate.
const EMBEDDED_DOCUMENT: &str = include_str!("../openapi/echo.json");

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
const REQUEST_BODY_REF_PREFIX: &str = "#/components/requestBodies/";
const PARAMETER_REF_PREFIX: &str = "#/components/parameters/";

/// Upper bound on chained `$ref` hops; guards against reference cycles.
const MAX_REF_HOPS: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Value>,
    #[serde(default)]
    pub request_bodies: BTreeMap<String, RequestBody>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
}

/// Either an inline object or a local `$ref` to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Item(T),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
    /// Parameters shared by every operation on this path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RefOr<Parameter>>,
}

impl PathItem {
    /// Look up the operation for an HTTP method (case-insensitive).
    pub fn operation(&self, method: &str) -> Option<&Operation> {
        match method.to_ascii_lowercase().as_str() {
            "get" => self.get.as_ref(),
            "put" => self.put.as_ref(),
            "post" => self.post.as_ref(),
            "delete" => self.delete.as_ref(),
            "options" => self.options.as_ref(),
            "head" => self.head.as_ref(),
            "patch" => self.patch.as_ref(),
            "trace" => self.trace.as_ref(),
            _ => None,
        }
    }

    fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.put,
            &self.post,
            &self.delete,
            &self.options,
            &self.head,
            &self.patch,
            &self.trace,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RefOr<Parameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RefOr<RequestBody>>,
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl core::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Path => "path",
            Self::Cookie => "cookie",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// An operation matched against a concrete request path.
#[derive(Debug, Clone)]
pub struct OperationMatch<'a> {
    /// The path template that matched (e.g. `/items/{id}`).
    pub template: &'a str,
    pub path_item: &'a PathItem,
    pub operation: &'a Operation,
    /// Values captured from templated segments, in template order.
    pub path_params: Vec<(&'a str, String)>,
}

impl OpenApiDocument {
    /// Parse a JSON document and check that every local reference used by a
    /// request resolves.
    pub fn from_json(json: &str) -> SpecResult<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.check()?;
        Ok(doc)
    }

    /// Read and parse a document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> SpecResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The echo API document compiled into this crate.
    pub fn embedded() -> SpecResult<Self> {
        Self::from_json(EMBEDDED_DOCUMENT)
    }

    /// Drop the `servers` list so request validation never depends on the
    /// host the server happens to be reached through.
    pub fn clear_servers(&mut self) {
        self.servers.clear();
    }

    /// Find the operation serving `method` on the concrete `path`.
    ///
    /// Templates with more literal segments win over templated ones, so
    /// `/items/latest` beats `/items/{id}`.
    pub fn find_operation<'a>(
        &'a self,
        method: &str,
        path: &str,
    ) -> Result<OperationMatch<'a>, ValidationError> {
        let mut best: Option<(usize, &'a str, &'a PathItem, Vec<(&'a str, String)>)> = None;

        for (template, item) in &self.paths {
            let Some((literals, params)) = match_template(template, path) else {
                continue;
            };
            if best.as_ref().is_none_or(|(score, ..)| literals > *score) {
                best = Some((literals, template.as_str(), item, params));
            }
        }

        let (_, template, path_item, path_params) = best.ok_or(ValidationError::RouteNotFound)?;
        let operation = path_item
            .operation(method)
            .ok_or(ValidationError::MethodNotAllowed)?;

        Ok(OperationMatch {
            template,
            path_item,
            operation,
            path_params,
        })
    }

    /// Follow `$ref` links until an inline schema is reached.
    pub fn resolve_schema<'a>(&'a self, mut schema: &'a Value) -> SpecResult<&'a Value> {
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
                return Ok(schema);
            };
            schema = reference
                .strip_prefix(SCHEMA_REF_PREFIX)
                .and_then(|name| self.components.schemas.get(name))
                .ok_or_else(|| SpecError::unresolved(reference))?;
        }
        Err(SpecError::unresolved("reference chain too long"))
    }

    pub fn resolve_request_body<'a>(
        &'a self,
        body: &'a RefOr<RequestBody>,
    ) -> SpecResult<&'a RequestBody> {
        match body {
            RefOr::Item(body) => Ok(body),
            RefOr::Ref { reference } => reference
                .strip_prefix(REQUEST_BODY_REF_PREFIX)
                .and_then(|name| self.components.request_bodies.get(name))
                .ok_or_else(|| SpecError::unresolved(reference.as_str())),
        }
    }

    pub fn resolve_parameter<'a>(
        &'a self,
        parameter: &'a RefOr<Parameter>,
    ) -> SpecResult<&'a Parameter> {
        match parameter {
            RefOr::Item(parameter) => Ok(parameter),
            RefOr::Ref { reference } => reference
                .strip_prefix(PARAMETER_REF_PREFIX)
                .and_then(|name| self.components.parameters.get(name))
                .ok_or_else(|| SpecError::unresolved(reference.as_str())),
        }
    }

    fn check(&self) -> SpecResult<()> {
        if !self.openapi.starts_with("3.") {
            return Err(SpecError::UnsupportedVersion(self.openapi.clone()));
        }

        for item in self.paths.values() {
            for parameter in &item.parameters {
                self.check_parameter(parameter)?;
            }
            for operation in item.operations() {
                for parameter in &operation.parameters {
                    self.check_parameter(parameter)?;
                }
                if let Some(body) = &operation.request_body {
                    let body = self.resolve_request_body(body)?;
                    for media in body.content.values() {
                        if let Some(schema) = &media.schema {
                            self.check_schema_refs(schema)?;
                        }
                    }
                }
            }
        }

        for schema in self.components.schemas.values() {
            self.check_schema_refs(schema)?;
        }

        Ok(())
    }

    fn check_parameter(&self, parameter: &RefOr<Parameter>) -> SpecResult<()> {
        let parameter = self.resolve_parameter(parameter)?;
        if let Some(schema) = &parameter.schema {
            self.check_schema_refs(schema)?;
        }
        Ok(())
    }

    fn check_schema_refs(&self, schema: &Value) -> SpecResult<()> {
        match schema {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    let known = reference
                        .strip_prefix(SCHEMA_REF_PREFIX)
                        .is_some_and(|name| self.components.schemas.contains_key(name));
                    if !known {
                        return Err(SpecError::unresolved(reference));
                    }
                }
                map.values().try_for_each(|v| self.check_schema_refs(v))
            }
            Value::Array(items) => items.iter().try_for_each(|v| self.check_schema_refs(v)),
            _ => Ok(()),
        }
    }
}

/// Match a concrete path against a template.
///
/// Returns the number of literal segments and the captured parameters.
fn match_template<'t>(template: &'t str, path: &str) -> Option<(usize, Vec<(&'t str, String)>)> {
    let mut template_segments = template.split('/');
    let mut path_segments = path.split('/');
    let mut literals = 0;
    let mut params = Vec::new();

    loop {
        match (template_segments.next(), path_segments.next()) {
            (None, None) => return Some((literals, params)),
            (Some(t), Some(p)) => {
                if let Some(name) = t.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
                    if p.is_empty() {
                        return None;
                    }
                    params.push((name, percent_decode_str(p).decode_utf8_lossy().into_owned()));
                } else if t == p {
                    literals += 1;
                } else {
                    return None;
                }
            }
            _ => return None,
        }
    }
}
