//! Schema-conformant random values for parameters with no example.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::raml::{NamedParam, ParamType};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RandomError {
    #[error("cannot generate a value for parameter type '{0}'")]
    UnsupportedType(String),
}

/// String-length bounds used when a parameter declares none of its own.
/// Not RAML-mandated; both bounds are deliberately configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorDefaults {
    pub string_min: u64,
    pub string_max: u64,
}

impl Default for GeneratorDefaults {
    fn default() -> Self {
        Self {
            string_min: 1,
            string_max: 15,
        }
    }
}

impl GeneratorDefaults {
    /// The wider bounds historically used when generating header values.
    pub fn header() -> Self {
        Self {
            string_min: 5,
            string_max: 20,
        }
    }
}

/// Produces values satisfying a named parameter's declared constraints.
/// A declared `example` always wins over generation.
pub struct RandomValueGenerator {
    defaults: GeneratorDefaults,
    rng: SmallRng,
}

impl Default for RandomValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomValueGenerator {
    pub fn new() -> Self {
        Self::with_defaults(GeneratorDefaults::default())
    }

    pub fn with_defaults(defaults: GeneratorDefaults) -> Self {
        Self {
            defaults,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            defaults: GeneratorDefaults::default(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn value_for(&mut self, param: &NamedParam) -> Result<Value, RandomError> {
        if let Some(example) = &param.example {
            return Ok(example.clone());
        }
        match &param.param_type {
            ParamType::String => Ok(self.string_value(param)),
            ParamType::Number => Ok(self.number_value(param)),
            ParamType::Integer => Ok(self.integer_value(param)),
            ParamType::Boolean => Ok(Value::Bool(self.rng.gen_bool(0.5))),
            ParamType::Date => Ok(Value::String(Utc::now().to_rfc3339())),
            ty => Err(RandomError::UnsupportedType(ty.as_str().to_string())),
        }
    }

    /// A random array value: a single random string element.
    pub fn array_value(&mut self) -> Value {
        Value::Array(vec![Value::String(self.random_string(None, None))])
    }

    /// A random object value: one random string key mapped to a random
    /// string.
    pub fn object_value(&mut self) -> Value {
        let mut map = Map::new();
        map.insert(
            self.random_string(None, None),
            Value::String(self.random_string(None, None)),
        );
        Value::Object(map)
    }

    /// A value for a JSON-Schema property fragment (used when filling
    /// required body properties): dispatches on the fragment's `type`.
    pub fn schema_value(&mut self, fragment: &Value) -> Result<Value, RandomError> {
        let ty = fragment
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("string");
        match ty {
            "array" => Ok(self.array_value()),
            "object" => Ok(self.object_value()),
            other => {
                let mut param = NamedParam::new("", ParamType::from_raml(other));
                param.enum_values = fragment
                    .get("enum")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                param.min_length = fragment.get("minLength").and_then(Value::as_u64);
                param.max_length = fragment.get("maxLength").and_then(Value::as_u64);
                param.minimum = fragment.get("minimum").and_then(Value::as_f64);
                param.maximum = fragment.get("maximum").and_then(Value::as_f64);
                self.value_for(&param)
            }
        }
    }

    fn string_value(&mut self, param: &NamedParam) -> Value {
        if !param.enum_values.is_empty() {
            let idx = self.rng.gen_range(0..param.enum_values.len());
            return param.enum_values[idx].clone();
        }
        Value::String(self.random_string(param.min_length, param.max_length))
    }

    fn number_value(&mut self, param: &NamedParam) -> Value {
        let min = param.minimum.unwrap_or(1.0) as i64;
        let max = param.maximum.unwrap_or(100.0) as i64;
        let whole = if min >= max {
            min
        } else {
            self.rng.gen_range(min..=max - 1)
        };
        json!(whole as f64 + self.rng.gen::<f64>())
    }

    fn integer_value(&mut self, param: &NamedParam) -> Value {
        let min = param.minimum.unwrap_or(1.0) as i64;
        let max = param.maximum.unwrap_or(100.0) as i64;
        let value = if min >= max {
            min
        } else {
            self.rng.gen_range(min..=max)
        };
        json!(value)
    }

    fn random_string(&mut self, min: Option<u64>, max: Option<u64>) -> String {
        let min = min.unwrap_or(self.defaults.string_min);
        let max = max.unwrap_or(self.defaults.string_max).max(min);
        let len = self.rng.gen_range(min..=max) as usize;
        (0..len)
            .map(|_| self.rng.sample(Alphanumeric) as char)
            .collect()
    }
}
