//! Request validation against an OpenAPI document.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::ValidationError;
use crate::openapi::{MediaType, OpenApiDocument, OperationMatch, Parameter, ParameterLocation, RequestBody};
use crate::schema::SchemaValidator;

/// The parts of an HTTP request the validator looks at.
///
/// Kept free of any HTTP framework types so the server layer can build it from
/// whatever request representation it has.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestInput<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Raw query string without the leading `?`.
    pub query: Option<&'a str>,
    /// Header values as raw bytes; non-UTF-8 values fail validation of the
    /// parameter they belong to.
    pub headers: &'a [(&'a str, &'a [u8])],
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl RequestInput<'_> {
    fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(h, _)| h.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// First value of a query parameter, percent- and `+`-decoded.
    fn query_value(&self, name: &str) -> Option<Cow<'_, str>> {
        form_urlencoded::parse(self.query?.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Validates incoming requests against the operations of one document.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    document: OpenApiDocument,
}

impl RequestValidator {
    pub fn new(document: OpenApiDocument) -> Self {
        Self { document }
    }

    /// Validate a request, returning the first problem found.
    ///
    /// Checks run in order: operation lookup, parameters, then the body.
    pub fn validate(&self, request: &RequestInput<'_>) -> Result<(), ValidationError> {
        let matched = self.document.find_operation(request.method, request.path)?;
        self.check_parameters(&matched, request)?;

        if let Some(body) = &matched.operation.request_body {
            let body = self
                .document
                .resolve_request_body(body)
                .map_err(|e| ValidationError::Document(e.to_string()))?;
            self.check_body(body, request)?;
        }

        Ok(())
    }

    fn check_parameters(&self, matched: &OperationMatch<'_>, request: &RequestInput<'_>) -> Result<(), ValidationError> {
        let declared = matched
            .path_item
            .parameters
            .iter()
            .chain(matched.operation.parameters.iter());

        for parameter in declared {
            let parameter = self
                .document
                .resolve_parameter(parameter)
                .map_err(|e| ValidationError::Document(e.to_string()))?;

            let raw: Option<Cow<'_, str>> = match parameter.location {
                ParameterLocation::Query => request.query_value(&parameter.name),
                ParameterLocation::Header => match request.header(&parameter.name) {
                    Some(bytes) => Some(Cow::Borrowed(std::str::from_utf8(bytes).map_err(|_| {
                        ValidationError::InvalidParameter {
                            name: parameter.name.clone(),
                            location: parameter.location.to_string(),
                            reason: "value is not valid UTF-8".to_string(),
                        }
                    })?)),
                    None => None,
                },
                ParameterLocation::Path => matched
                    .path_params
                    .iter()
                    .find(|(name, _)| *name == parameter.name)
                    .map(|(_, value)| Cow::Borrowed(value.as_str())),
                // Cookies are not inspected.
                ParameterLocation::Cookie => continue,
            };

            match raw {
                Some(raw) => self.check_parameter_value(parameter, &raw)?,
                None if parameter.required || parameter.location == ParameterLocation::Path => {
                    return Err(ValidationError::missing_parameter(
                        parameter.name.as_str(),
                        parameter.location.to_string(),
                    ));
                }
                None => {}
            }
        }

        Ok(())
    }

    fn check_parameter_value(&self, parameter: &Parameter, raw: &str) -> Result<(), ValidationError> {
        let Some(schema) = &parameter.schema else {
            return Ok(());
        };
        let resolved = self
            .document
            .resolve_schema(schema)
            .map_err(|e| ValidationError::Document(e.to_string()))?;
        let value = coerce_parameter(resolved, raw);

        SchemaValidator::new(&self.document)
            .validate(schema, &value)
            .map_err(|e| ValidationError::InvalidParameter {
                name: parameter.name.clone(),
                location: parameter.location.to_string(),
                reason: e.reason,
            })
    }

    fn check_body(&self, body: &RequestBody, request: &RequestInput<'_>) -> Result<(), ValidationError> {
        if request.body.is_empty() {
            return if body.required {
                Err(ValidationError::MissingBody)
            } else {
                Ok(())
            };
        }

        let content_type = request.content_type.unwrap_or("");
        let (media_key, media) = find_media_type(body, content_type)
            .ok_or_else(|| ValidationError::UnsupportedMediaType(content_type.to_string()))?;

        if !is_json(media_key) && !is_json(content_type) {
            return Ok(());
        }

        let value: Value =
            serde_json::from_slice(request.body).map_err(|e| ValidationError::decode(e.to_string()))?;

        if let Some(schema) = &media.schema {
            SchemaValidator::new(&self.document).validate(schema, &value)?;
        }

        Ok(())
    }
}

/// Pick the media type entry serving `content_type`.
///
/// Exact matches win, then `type/*`, then `*/*`. Parameters such as
/// `charset` are ignored.
pub fn find_media_type<'a>(body: &'a RequestBody, content_type: &str) -> Option<(&'a str, &'a MediaType)> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }
    let wildcard = essence
        .split_once('/')
        .map(|(top, _)| format!("{top}/*"))
        .unwrap_or_default();

    [essence.as_str(), wildcard.as_str(), "*/*"]
        .into_iter()
        .find_map(|key| {
            body.content
                .iter()
                .find(|(declared, _)| declared.eq_ignore_ascii_case(key))
        })
        .map(|(key, media)| (key.as_str(), media))
}

fn is_json(media_type: &str) -> bool {
    let essence = media_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Turn a raw parameter string into the JSON value its schema expects.
fn coerce_parameter(schema: &Value, raw: &str) -> Value {
    match schema.get("type").and_then(Value::as_str) {
        Some("integer") => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_validator() -> RequestValidator {
        let mut doc = OpenApiDocument::embedded().unwrap();
        doc.clear_servers();
        RequestValidator::new(doc)
    }

    fn post_echo<'a>(content_type: Option<&'a str>, body: &'a [u8]) -> RequestInput<'a> {
        RequestInput {
            method: "POST",
            path: "/echo",
            content_type,
            body,
            ..Default::default()
        }
    }

    #[test]
    fn valid_echo_request_passes() {
        let v = echo_validator();
        let req = post_echo(Some("application/json"), br#"{"message":"hello"}"#);
        assert_eq!(v.validate(&req), Ok(()));
    }

    #[test]
    fn charset_parameter_is_ignored() {
        let v = echo_validator();
        let req = post_echo(Some("application/json; charset=utf-8"), br#"{"message":""}"#);
        assert_eq!(v.validate(&req), Ok(()));
    }

    #[test]
    fn missing_message_is_a_schema_error() {
        let v = echo_validator();
        let err = v
            .validate(&post_echo(Some("application/json"), b"{}"))
            .unwrap_err();
        assert!(matches!(&err, ValidationError::Schema(e) if e.reason == "property \"message\" is missing"));
        assert_eq!(
            err.to_string(),
            "request body has an error: doesn't match schema: property \"message\" is missing"
        );
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let v = echo_validator();
        let err = v
            .validate(&post_echo(Some("application/json"), b"{\"message\":"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::Decode(_)));
        assert!(err.is_request_error());
    }

    #[test]
    fn empty_required_body_is_rejected() {
        let v = echo_validator();
        let err = v.validate(&post_echo(Some("application/json"), b"")).unwrap_err();
        assert_eq!(err, ValidationError::MissingBody);
    }

    #[test]
    fn undeclared_content_type_is_rejected() {
        let v = echo_validator();
        let err = v
            .validate(&post_echo(Some("text/plain"), br#"{"message":"x"}"#))
            .unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedMediaType("text/plain".into()));

        let err = v.validate(&post_echo(None, br#"{"message":"x"}"#)).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedMediaType(String::new()));
    }

    #[test]
    fn routing_errors_surface() {
        let v = echo_validator();
        let get = RequestInput {
            method: "GET",
            path: "/echo",
            ..Default::default()
        };
        assert_eq!(v.validate(&get).unwrap_err(), ValidationError::MethodNotAllowed);

        let unknown = RequestInput {
            method: "GET",
            path: "/health",
            ..Default::default()
        };
        assert_eq!(v.validate(&unknown).unwrap_err(), ValidationError::RouteNotFound);
        assert!(!ValidationError::RouteNotFound.is_request_error());
    }

    #[test]
    fn media_type_wildcards() {
        let body: RequestBody = serde_json::from_value(serde_json::json!({
            "content": {
                "application/*": {},
                "*/*": {}
            }
        }))
        .unwrap();

        assert_eq!(find_media_type(&body, "application/xml").map(|m| m.0), Some("application/*"));
        assert_eq!(find_media_type(&body, "text/csv").map(|m| m.0), Some("*/*"));
        assert!(find_media_type(&body, "").is_none());
    }

    #[test]
    fn parameters_are_checked() {
        let doc = OpenApiDocument::from_json(
            &serde_json::json!({
                "openapi": "3.0.3",
                "info": { "title": "t", "version": "1" },
                "paths": {
                    "/items/{id}": {
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } }
                        ],
                        "get": {
                            "parameters": [
                                { "name": "limit", "in": "query", "required": true, "schema": { "type": "integer", "maximum": 100 } },
                                { "name": "X-Trace", "in": "header" }
                            ]
                        }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        let v = RequestValidator::new(doc);

        let ok = RequestInput {
            method: "GET",
            path: "/items/7",
            query: Some("limit=10"),
            ..Default::default()
        };
        assert_eq!(v.validate(&ok), Ok(()));

        let missing = RequestInput { query: None, ..ok };
        assert_eq!(
            v.validate(&missing).unwrap_err(),
            ValidationError::missing_parameter("limit", "query")
        );

        let too_big = RequestInput { query: Some("limit=500"), ..ok };
        assert!(matches!(
            v.validate(&too_big).unwrap_err(),
            ValidationError::InvalidParameter { name, .. } if name == "limit"
        ));

        let bad_id = RequestInput { path: "/items/abc", ..ok };
        let err = v.validate(&bad_id).unwrap_err();
        assert!(err.to_string().contains("parameter \"id\" in path"));
    }

    fn tagged_doc() -> RequestValidator {
        let doc = OpenApiDocument::from_json(
            &serde_json::json!({
                "openapi": "3.0.3",
                "info": { "title": "t", "version": "1" },
                "paths": {
                    "/tags/{tag}": {
                        "get": {
                            "parameters": [
                                { "name": "tag", "in": "path", "required": true, "schema": { "type": "string", "enum": ["red fox"] } },
                                { "name": "name", "in": "query", "required": true, "schema": { "type": "string", "enum": ["a b"] } },
                                { "name": "X-Tenant", "in": "header", "required": true, "schema": { "type": "string", "maxLength": 8 } }
                            ]
                        }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        RequestValidator::new(doc)
    }

    #[test]
    fn query_and_path_values_are_decoded_before_schema_checks() {
        let v = tagged_doc();
        let headers: &[(&str, &[u8])] = &[("x-tenant", &b"acme"[..])];

        for query in ["name=a%20b", "name=a+b", "other=1&name=a%20b"] {
            let req = RequestInput {
                method: "GET",
                path: "/tags/red%20fox",
                query: Some(query),
                headers,
                ..Default::default()
            };
            assert_eq!(v.validate(&req), Ok(()), "query={query}");
        }

        let literal = RequestInput {
            method: "GET",
            path: "/tags/red%20fox",
            query: Some("name=a%2520b"),
            headers,
            ..Default::default()
        };
        assert!(matches!(
            v.validate(&literal).unwrap_err(),
            ValidationError::InvalidParameter { name, .. } if name == "name"
        ));
    }

    #[test]
    fn non_utf8_header_is_invalid_not_missing() {
        let v = tagged_doc();
        let base = RequestInput {
            method: "GET",
            path: "/tags/red%20fox",
            query: Some("name=a+b"),
            ..Default::default()
        };

        let absent = v.validate(&base).unwrap_err();
        assert_eq!(absent, ValidationError::missing_parameter("X-Tenant", "header"));

        let headers: &[(&str, &[u8])] = &[("x-tenant", &b"\xff\xfe"[..])];
        let err = v.validate(&RequestInput { headers, ..base }).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidParameter {
                name: "X-Tenant".to_string(),
                location: "header".to_string(),
                reason: "value is not valid UTF-8".to_string(),
            }
        );
    }
}
