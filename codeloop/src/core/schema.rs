//! Validation of LLM-supplied arguments against a tool's parameter schema.
//!
//! Checks run in a fixed order so the reported code is deterministic:
//! required fields first (`MISSING_PARAMETER`), then declared property types
//! (`INVALID_PARAMETER_TYPE`), then the full JSON Schema (`INVALID_PARAMETER`).

use jsonschema::Draft;
use serde_json::{Map, Value};

use crate::core::errors::StandardizedToolError;

/// Validate `arguments` for `tool` and return them normalized to an object.
///
/// `null` arguments are treated as `{}`; a `null` value for a required field
/// counts as missing. A schema that does not compile is an internal fault of
/// the tool and is reported as `INTERNAL_ERROR`.
pub fn validate_arguments(
    tool: &str,
    schema: &Value,
    arguments: &Value,
) -> Result<Value, StandardizedToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    let Some(object) = arguments.as_object() else {
        return Err(StandardizedToolError::invalid_parameter_type(
            tool,
            "arguments",
            "expected a JSON object of named parameters",
        ));
    };

    for field in required_fields(schema) {
        if object.get(field).is_none_or(Value::is_null) {
            return Err(StandardizedToolError::missing_parameter(tool, field));
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in object {
            let Some(expected) = properties.get(name).and_then(|p| p.get("type")) else {
                continue;
            };
            if !matches_declared_type(expected, value) {
                return Err(StandardizedToolError::invalid_parameter_type(
                    tool,
                    name,
                    format!("expected {}, got {}", describe_type(expected), json_type(value)),
                ));
            }
        }
    }

    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| {
            StandardizedToolError::internal_error(tool, format!("invalid parameter schema: {err}"))
        })?;
    let messages: Vec<String> = compiled
        .iter_errors(&arguments)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(
            StandardizedToolError::invalid_parameter(tool, "arguments", messages.join("; "))
                .with_detail("violations", messages),
        );
    }

    Ok(arguments)
}

/// Names listed in the schema's top-level `required` array.
pub fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn matches_declared_type(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => matches_type_name(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_type_name(name, value)),
        _ => true,
    }
}

fn matches_type_name(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCode;
    use serde_json::json;

    fn read_file_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "minLength": 1 },
                "start_line": { "type": "integer", "minimum": 1 }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    #[test]
    fn conforming_payload_validates() {
        let args = json!({"path": "src/main.go", "start_line": 3});
        let validated = validate_arguments("read_file", &read_file_schema(), &args).expect("valid");
        assert_eq!(validated, args);
    }

    #[test]
    fn missing_required_field_is_missing_parameter() {
        let err = validate_arguments("read_file", &read_file_schema(), &json!({"start_line": 1}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
        assert_eq!(err.details["parameter"], json!("path"));
    }

    #[test]
    fn null_arguments_are_empty_object() {
        let err = validate_arguments("read_file", &read_file_schema(), &Value::Null).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);

        let schema = json!({"type": "object", "properties": {}});
        let validated = validate_arguments("list_directory", &schema, &Value::Null).expect("valid");
        assert_eq!(validated, json!({}));
    }

    #[test]
    fn null_required_value_counts_as_missing() {
        let err = validate_arguments("read_file", &read_file_schema(), &json!({"path": null}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }

    #[test]
    fn wrong_property_type_is_reported() {
        let err = validate_arguments(
            "read_file",
            &read_file_schema(),
            &json!({"path": "a", "start_line": "ten"}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterType);
        assert!(err.message.contains("start_line"));
    }

    #[test]
    fn other_schema_violations_are_invalid_parameter() {
        let err = validate_arguments(
            "read_file",
            &read_file_schema(),
            &json!({"path": "a", "start_line": 0}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);

        let err = validate_arguments(
            "read_file",
            &read_file_schema(),
            &json!({"path": "a", "mode": "fast"}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err =
            validate_arguments("read_file", &read_file_schema(), &json!(["a"])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterType);
    }

    #[test]
    fn malformed_schema_is_internal_error() {
        let schema = json!({"type": "object", "properties": {"path": {"type": 12}}});
        let err = validate_arguments("broken", &schema, &json!({"path": "a"})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }
}
