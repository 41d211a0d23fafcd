//! Conversion of RAML named parameters to JSON-Schema fragments.

use serde_json::{json, Map, Value};

use crate::raml::document::{NamedParam, ParamType};

/// Builds the JSON-Schema fragment for one named parameter. Only the
/// constraints that participate in JSON-Schema validation are carried
/// over. `date` maps to a date-time formatted string unless the
/// parameter declares its own `pattern`.
pub fn named_param_schema(param: &NamedParam) -> Value {
    let mut schema = Map::new();
    match &param.param_type {
        ParamType::Date => {
            schema.insert("type".into(), json!("string"));
            if param.pattern.is_none() {
                schema.insert("format".into(), json!("date-time"));
            }
        }
        other => {
            schema.insert("type".into(), json!(other.as_str()));
        }
    }
    if !param.enum_values.is_empty() {
        schema.insert("enum".into(), Value::Array(param.enum_values.clone()));
    }
    if let Some(min) = param.min_length {
        schema.insert("minLength".into(), json!(min));
    }
    if let Some(max) = param.max_length {
        schema.insert("maxLength".into(), json!(max));
    }
    if let Some(min) = param.minimum {
        schema.insert("minimum".into(), json!(min));
    }
    if let Some(max) = param.maximum {
        schema.insert("maximum".into(), json!(max));
    }
    if let Some(pattern) = &param.pattern {
        schema.insert("pattern".into(), json!(pattern));
    }
    if let Some(default) = &param.default {
        schema.insert("default".into(), default.clone());
    }
    Value::Object(schema)
}
