//! Response-header validation against RAML named-parameter
//! declarations.

use serde_json::{json, Value};

use crate::raml::{named_param_schema, NamedParam, ParamType};
use crate::report::Check;

/// Coerces an observed header string to the declared parameter type.
/// `boolean` recognizes only the literal strings `true`/`false` and
/// passes anything else through for the schema to reject; unparseable
/// numbers are a typed failure distinct from schema violations.
pub fn coerce(param_type: &ParamType, raw: &str) -> Result<Value, String> {
    match param_type {
        ParamType::Number => raw
            .parse::<f64>()
            .map(|n| json!(n))
            .map_err(|_| format!("header value '{}' is not of type `number`", raw)),
        ParamType::Integer => raw
            .parse::<i64>()
            .map(|n| json!(n))
            .map_err(|_| format!("header value '{}' is not of type `integer`", raw)),
        ParamType::Boolean => Ok(match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        }),
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Validates one observed header value (or its absence) against the
/// declared parameter, via a single-property JSON-Schema built from the
/// declaration.
pub fn check_header(param: &NamedParam, observed: Option<&str>) -> Check {
    let subject = format!("header {}", param.name);

    let coerced = match observed {
        Some(raw) => match coerce(&param.param_type, raw) {
            Ok(value) => Some(value),
            Err(message) => return Check::fail(subject, message),
        },
        None => None,
    };

    let property_schema = named_param_schema(param);
    let mut schema = json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "type": "object",
        "properties": { "header": property_schema },
    });
    if param.required {
        schema["required"] = json!(["header"]);
    }

    let instance = match coerced {
        Some(value) => json!({ "header": value }),
        None => json!({}),
    };

    let validator = match jsonschema::validator_for(&schema) {
        Ok(validator) => validator,
        Err(err) => return Check::fail(subject, format!("invalid header schema: {}", err)),
    };
    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|err| err.to_string())
        .collect();
    if errors.is_empty() {
        Check::pass(subject)
    } else {
        Check::fail(subject, errors.join("; "))
    }
}
