//! Request-body factories derived from RAML examples.

use dyn_clone::DynClone;
use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::raml::{resource_name_from_path, Method, ResourceIndex};

pub type JsonObject = Map<String, Value>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DataError {
    #[error("example for '{key}' failed to parse as structured data")]
    ExampleNotStructured { key: String },

    #[error("both 'body' and 'data' supplied for {method} {path}")]
    BodyAndData { method: Method, path: String },
}

/// Produces request-body data, optionally adjusted by caller-supplied
/// override fields. Factories are cloned freely between the registry,
/// scopes and individual test declarations.
pub trait BodyFactory: DynClone {
    fn build(&self, overrides: &JsonObject) -> Value;
}

dyn_clone::clone_trait_object!(BodyFactory);

/// Adapter letting a plain closure serve as a factory.
#[derive(Clone)]
pub struct FnFactory<F>(pub F);

impl<F> BodyFactory for FnFactory<F>
where
    F: Fn(&JsonObject) -> Value + Clone,
{
    fn build(&self, overrides: &JsonObject) -> Value {
        (self.0)(overrides)
    }
}

/// The default factory kind: a shallow copy of a stored example merged
/// with overrides, override winning on key collision. The stored example
/// is never mutated.
#[derive(Debug, Clone, Default)]
pub struct ExampleFactory {
    example: JsonObject,
}

impl ExampleFactory {
    pub fn new(example: JsonObject) -> Self {
        Self { example }
    }
}

impl BodyFactory for ExampleFactory {
    fn build(&self, overrides: &JsonObject) -> Value {
        let mut object = self.example.clone();
        for (key, value) in overrides {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Registry of reusable body factories keyed by `"METHOD /path"` routes
/// and by resource names. Looked up, never mutated, after construction.
#[derive(Clone, Default)]
pub struct Examples {
    factories: Vec<(String, Box<dyn BodyFactory>)>,
}

impl Examples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from a resource index: every JSON body
    /// example is keyed by its route, and POST examples are additionally
    /// keyed by resource name so item scopes can reuse their
    /// collection's creation data. Unusable examples are skipped with a
    /// warning; the route simply ends up with no factory.
    pub fn from_index(index: &ResourceIndex) -> Self {
        let mut examples = Self::new();
        for entry in index.iter() {
            for node in &entry.methods {
                let Some(body) = node.body("application/json") else {
                    continue;
                };
                let Some(example) = &body.example else {
                    continue;
                };
                let route = format!("{} {}", node.method, node.path);
                if let Err(err) = examples.define(&route, Some(example)) {
                    warn!("{}", err);
                    continue;
                }
                if node.method == Method::Post {
                    let name = resource_name_from_path(&node.path, true);
                    if let Err(err) = examples.define(&name, Some(example)) {
                        warn!("{}", err);
                    }
                }
            }
        }
        examples
    }

    /// Stores a factory for `key`. An absent or empty example yields a
    /// factory that always returns an empty object, overrides included;
    /// an example that is not an object cannot be merged and is a
    /// [DataError].
    pub fn define(&mut self, key: &str, example: Option<&Value>) -> Result<(), DataError> {
        let example = match example {
            None | Some(Value::Null) => JsonObject::new(),
            Some(Value::Object(object)) => object.clone(),
            Some(Value::String(s)) if s.trim().is_empty() => JsonObject::new(),
            Some(_) => {
                return Err(DataError::ExampleNotStructured {
                    key: key.to_string(),
                })
            }
        };
        let factory: Box<dyn BodyFactory> = Box::new(ExampleFactory { example });
        match self.factories.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((key.to_string(), factory)),
        }
        Ok(())
    }

    /// Exact-key lookup; a miss is not an error, callers fall through
    /// the factory precedence chain.
    pub fn get(&self, key: &str) -> Option<Box<dyn BodyFactory>> {
        self.factories
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, factory)| factory.clone())
    }

    /// Convenience: look up `key` and build with `overrides`.
    pub fn build(&self, key: &str, overrides: &JsonObject) -> Option<Value> {
        self.get(key).map(|factory| factory.build(overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(pairs: &[(&str, Value)]) -> JsonObject {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn factory_returns_the_example() {
        let mut examples = Examples::new();
        examples
            .define("user", Some(&json!({"a": 1, "b": 2})))
            .unwrap();
        let value = examples.build("user", &JsonObject::new()).unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn overrides_merge_without_destroying_the_example() {
        let mut examples = Examples::new();
        examples.define("user", Some(&json!({"a": 1}))).unwrap();
        let merged = examples
            .build("user", &overrides(&[("c", json!(3))]))
            .unwrap();
        assert_eq!(merged, json!({"a": 1, "c": 3}));
        // repeated calls start from the stored example again
        let plain = examples.build("user", &JsonObject::new()).unwrap();
        assert_eq!(plain, json!({"a": 1}));
    }

    #[test]
    fn override_wins_on_collision() {
        let mut examples = Examples::new();
        examples.define("user", Some(&json!({"a": 1}))).unwrap();
        let merged = examples
            .build("user", &overrides(&[("a", json!(9))]))
            .unwrap();
        assert_eq!(merged, json!({"a": 9}));
    }

    #[test]
    fn empty_examples_always_yield_empty_objects() {
        let mut examples = Examples::new();
        examples.define("empty", Some(&json!({}))).unwrap();
        examples.define("null", Some(&Value::Null)).unwrap();
        examples.define("none", None).unwrap();
        for key in ["empty", "null", "none"] {
            let value = examples
                .build(key, &overrides(&[("ignored", json!(1))]))
                .unwrap();
            assert_eq!(value, json!({}), "key {}", key);
        }
    }

    #[test]
    fn unstructured_examples_are_data_errors() {
        let mut examples = Examples::new();
        let err = examples
            .define("bad", Some(&json!("not an object")))
            .unwrap_err();
        assert_eq!(
            err,
            DataError::ExampleNotStructured {
                key: "bad".to_string()
            }
        );
        assert!(examples.get("bad").is_none());
    }

    #[test]
    fn missing_keys_are_not_errors() {
        let examples = Examples::new();
        assert!(examples.get("absent").is_none());
    }

    #[test]
    fn closures_can_serve_as_factories() {
        let factory = FnFactory(|overrides: &JsonObject| {
            let mut object = JsonObject::new();
            object.insert("generated".into(), json!(true));
            for (k, v) in overrides {
                object.insert(k.clone(), v.clone());
            }
            Value::Object(object)
        });
        let boxed: Box<dyn BodyFactory> = Box::new(factory);
        let copy = boxed.clone();
        assert_eq!(
            copy.build(&overrides(&[("x", json!(1))])),
            json!({"generated": true, "x": 1})
        );
    }

    mod from_index {
        use super::super::*;
        use crate::raml::{parse_str, ResourceIndex};
        use serde_json::json;

        const RAML: &str = r#"#%RAML 0.8
title: T
baseUri: http://x.example.com
/users:
  post:
    body:
      application/json:
        example: |
          {"username": "alice"}
  /{username}:
    /profile:
      put:
        body:
          application/json:
            example: |
              {"bio": "hi"}
"#;

        #[test]
        fn routes_and_resource_names_are_keyed() {
            let doc = parse_str(RAML).unwrap();
            let index = ResourceIndex::build(&doc);
            let examples = Examples::from_index(&index);
            assert_eq!(
                examples.build("POST /users", &JsonObject::new()),
                Some(json!({"username": "alice"}))
            );
            assert_eq!(
                examples.build("user", &JsonObject::new()),
                Some(json!({"username": "alice"}))
            );
            // non-POST examples are keyed by route only
            assert_eq!(
                examples.build("PUT /users/{username}/profile", &JsonObject::new()),
                Some(json!({"bio": "hi"}))
            );
            assert!(examples.get("user.profile").is_none());
        }
    }
}
