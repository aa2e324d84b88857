//! JSON Schema validation for the subset of keywords OpenAPI 3.0 uses.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::openapi::OpenApiDocument;

/// Nesting limit for schemas and values.
const MAX_DEPTH: usize = 64;

/// Validates JSON values against schemas that may reference the document's
/// `components.schemas`.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    document: &'a OpenApiDocument,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(document: &'a OpenApiDocument) -> Self {
        Self { document }
    }

    /// Check `value` against `schema`, reporting the first mismatch.
    pub fn validate(&self, schema: &Value, value: &Value) -> Result<(), SchemaError> {
        self.check(schema, value, "", 0)
    }

    fn check(&self, schema: &Value, value: &Value, pointer: &str, depth: usize) -> Result<(), SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::new(pointer, "value is nested too deeply"));
        }

        let schema = self
            .document
            .resolve_schema(schema)
            .map_err(|e| SchemaError::new(pointer, e.to_string()))?;
        let Some(schema) = schema.as_object() else {
            return Ok(());
        };

        if value.is_null() && flag(schema, "nullable") {
            return Ok(());
        }

        self.check_combinators(schema, value, pointer, depth)?;

        if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(SchemaError::new(pointer, "value is not one of the allowed values"));
            }
        }

        if let Some(expected) = schema.get("type").and_then(Value::as_str) {
            check_type(expected, value, pointer)?;
        }

        match value {
            Value::String(s) => check_string(schema, s, pointer),
            Value::Number(_) => check_number(schema, value, pointer),
            Value::Array(items) => self.check_array(schema, items, pointer, depth),
            Value::Object(fields) => self.check_object(schema, fields, pointer, depth),
            _ => Ok(()),
        }
    }

    fn check_combinators(
        &self,
        schema: &Map<String, Value>,
        value: &Value,
        pointer: &str,
        depth: usize,
    ) -> Result<(), SchemaError> {
        if let Some(all) = schema.get("allOf").and_then(Value::as_array) {
            for sub in all {
                self.check(sub, value, pointer, depth + 1)?;
            }
        }

        if let Some(any) = schema.get("anyOf").and_then(Value::as_array) {
            if !any.iter().any(|sub| self.check(sub, value, pointer, depth + 1).is_ok()) {
                return Err(SchemaError::new(pointer, "doesn't match any schema from \"anyOf\""));
            }
        }

        if let Some(one) = schema.get("oneOf").and_then(Value::as_array) {
            let matched = one
                .iter()
                .filter(|sub| self.check(sub, value, pointer, depth + 1).is_ok())
                .count();
            if matched != 1 {
                return Err(SchemaError::new(
                    pointer,
                    format!("must match exactly one schema from \"oneOf\" (matched {matched})"),
                ));
            }
        }

        Ok(())
    }

    fn check_array(
        &self,
        schema: &Map<String, Value>,
        items: &[Value],
        pointer: &str,
        depth: usize,
    ) -> Result<(), SchemaError> {
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                return Err(SchemaError::new(pointer, format!("minimum number of items is {min}")));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if (items.len() as u64) > max {
                return Err(SchemaError::new(pointer, format!("maximum number of items is {max}")));
            }
        }
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                self.check(item_schema, item, &format!("{pointer}/{i}"), depth + 1)?;
            }
        }
        Ok(())
    }

    fn check_object(
        &self,
        schema: &Map<String, Value>,
        fields: &Map<String, Value>,
        pointer: &str,
        depth: usize,
    ) -> Result<(), SchemaError> {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    return Err(SchemaError::new(pointer, format!("property \"{name}\" is missing")));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        let additional = schema.get("additionalProperties");

        for (name, field) in fields {
            let child = format!("{pointer}/{}", escape_pointer(name));
            match properties.and_then(|p| p.get(name)) {
                Some(prop_schema) => self.check(prop_schema, field, &child, depth + 1)?,
                None => match additional {
                    Some(Value::Bool(false)) => {
                        return Err(SchemaError::new(pointer, format!("property \"{name}\" is unsupported")));
                    }
                    Some(extra @ Value::Object(_)) => self.check(extra, field, &child, depth + 1)?,
                    _ => {}
                },
            }
        }

        Ok(())
    }
}

fn flag(schema: &Map<String, Value>, key: &str) -> bool {
    schema.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn check_type(expected: &str, value: &Value, pointer: &str) -> Result<(), SchemaError> {
    let ok = match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "number" => value.is_number(),
        "integer" => is_integer(value),
        _ => true,
    };
    if ok {
        return Ok(());
    }

    if value.is_null() {
        return Err(SchemaError::new(pointer, "value is not nullable"));
    }
    let article = if expected == "object" || expected == "array" || expected == "integer" {
        "an"
    } else {
        "a"
    };
    Err(SchemaError::new(pointer, format!("value must be {article} {expected}")))
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn check_string(schema: &Map<String, Value>, s: &str, pointer: &str) -> Result<(), SchemaError> {
    let len = s.chars().count() as u64;
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if len < min {
            return Err(SchemaError::new(pointer, format!("minimum string length is {min}")));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        if len > max {
            return Err(SchemaError::new(pointer, format!("maximum string length is {max}")));
        }
    }
    Ok(())
}

fn check_number(schema: &Map<String, Value>, value: &Value, pointer: &str) -> Result<(), SchemaError> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };

    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        let exclusive = flag(schema, "exclusiveMinimum");
        if n < min || (exclusive && n == min) {
            let bound = if exclusive { "greater than" } else { "at least" };
            return Err(SchemaError::new(pointer, format!("number must be {bound} {min}")));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        let exclusive = flag(schema, "exclusiveMaximum");
        if n > max || (exclusive && n == max) {
            let bound = if exclusive { "less than" } else { "at most" };
            return Err(SchemaError::new(pointer, format!("number must be {bound} {max}")));
        }
    }
    Ok(())
}

/// RFC 6901 escaping for a single reference token.
fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn empty_doc() -> OpenApiDocument {
        OpenApiDocument::from_json(r#"{"openapi":"3.0.3","info":{"title":"t","version":"1"}}"#).unwrap()
    }

    fn check(schema: Value, value: Value) -> Result<(), SchemaError> {
        let doc = empty_doc();
        SchemaValidator::new(&doc).validate(&schema, &value)
    }

    #[test]
    fn echo_request_schema_requires_message() {
        let doc = OpenApiDocument::embedded().unwrap();
        let v = SchemaValidator::new(&doc);
        let schema = json!({ "$ref": "#/components/schemas/EchoRequest" });

        assert!(v.validate(&schema, &json!({ "message": "hi" })).is_ok());

        let err = v.validate(&schema, &json!({})).unwrap_err();
        assert_eq!(err.reason, "property \"message\" is missing");
        assert_eq!(err.pointer, "");

        let err = v.validate(&schema, &json!({ "message": 7 })).unwrap_err();
        assert_eq!(err.reason, "value must be a string");
        assert_eq!(err.pointer, "/message");
    }

    #[test]
    fn type_keyword_is_enforced() {
        assert!(check(json!({ "type": "integer" }), json!(3)).is_ok());
        assert!(check(json!({ "type": "integer" }), json!(3.0)).is_ok());
        assert!(check(json!({ "type": "integer" }), json!(3.5)).is_err());
        assert!(check(json!({ "type": "number" }), json!(3.5)).is_ok());
        assert!(check(json!({ "type": "boolean" }), json!("true")).is_err());

        let err = check(json!({ "type": "object" }), json!([])).unwrap_err();
        assert_eq!(err.reason, "value must be an object");
    }

    #[test]
    fn null_needs_nullable() {
        let err = check(json!({ "type": "string" }), Value::Null).unwrap_err();
        assert_eq!(err.reason, "value is not nullable");
        assert!(check(json!({ "type": "string", "nullable": true }), Value::Null).is_ok());
    }

    #[test]
    fn string_length_counts_chars() {
        let schema = json!({ "type": "string", "minLength": 2, "maxLength": 3 });
        assert!(check(schema.clone(), json!("a")).is_err());
        assert!(check(schema.clone(), json!("日本語")).is_ok());
        assert!(check(schema, json!("abcd")).is_err());
    }

    #[test]
    fn numeric_bounds() {
        let schema = json!({ "type": "number", "minimum": 0, "maximum": 10, "exclusiveMaximum": true });
        assert!(check(schema.clone(), json!(0)).is_ok());
        assert!(check(schema.clone(), json!(-1)).is_err());
        let err = check(schema, json!(10)).unwrap_err();
        assert_eq!(err.reason, "number must be less than 10");
    }

    #[test]
    fn enum_and_arrays() {
        let schema = json!({
            "type": "array",
            "minItems": 1,
            "items": { "type": "string", "enum": ["a", "b"] }
        });
        assert!(check(schema.clone(), json!(["a", "b"])).is_ok());
        assert!(check(schema.clone(), json!([])).is_err());

        let err = check(schema, json!(["a", "c"])).unwrap_err();
        assert_eq!(err.pointer, "/1");
    }

    #[test]
    fn additional_properties() {
        let closed = json!({
            "type": "object",
            "properties": { "message": { "type": "string" } },
            "additionalProperties": false
        });
        let err = check(closed, json!({ "message": "x", "extra": 1 })).unwrap_err();
        assert_eq!(err.reason, "property \"extra\" is unsupported");

        let typed = json!({ "type": "object", "additionalProperties": { "type": "integer" } });
        assert!(check(typed.clone(), json!({ "a": 1 })).is_ok());
        let err = check(typed, json!({ "a/b": "x" })).unwrap_err();
        assert_eq!(err.pointer, "/a~1b");
    }

    #[test]
    fn combinators() {
        let any = json!({ "anyOf": [{ "type": "string" }, { "type": "integer" }] });
        assert!(check(any.clone(), json!(1)).is_ok());
        assert!(check(any, json!(true)).is_err());

        let one = json!({ "oneOf": [{ "type": "number" }, { "type": "integer" }] });
        assert!(check(one.clone(), json!(1.5)).is_ok());
        assert!(check(one, json!(1)).is_err());

        let all = json!({ "allOf": [{ "type": "string" }, { "minLength": 2 }] });
        assert!(check(all, json!("a")).is_err());
    }

    proptest! {
        #[test]
        fn any_string_is_a_valid_message(message in any::<String>()) {
            let doc = OpenApiDocument::embedded().unwrap();
            let schema = json!({ "$ref": "#/components/schemas/EchoRequest" });
            let value = json!({ "message": message });
            prop_assert!(SchemaValidator::new(&doc).validate(&schema, &value).is_ok());
        }
    }
}
