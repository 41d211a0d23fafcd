//! Request descriptors and the resolution logic that builds them from a
//! scope, a verb and per-test options.

use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::raml::{self, Method, MethodNode, PathError, ResourceIndex};
use crate::random::{RandomError, RandomValueGenerator};
use crate::suite::factory::{BodyFactory, DataError, Examples, JsonObject};
use crate::suite::scope::ResourceScope;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("cannot resolve URL for {method} {path}: {source}")]
    Path {
        method: Method,
        path: String,
        source: PathError,
    },

    #[error("cannot generate a value for '{name}' on {method} {path}: {source}")]
    Random {
        method: Method,
        path: String,
        name: String,
        source: RandomError,
    },
}

/// How the executor obtains the request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSpec {
    /// Resolved at declaration time.
    Fixed(String),
    /// An item-level (dynamic) autotest URL, resolved at execution time
    /// through the object ledger; `fallback` is the example-resolved
    /// path when the template could be filled from RAML examples.
    DynamicItem {
        path: String,
        fallback: Option<String>,
    },
}

/// A fully parameterized request descriptor, bound to one
/// `(scope, verb)` pair. The body is only present when a factory or
/// explicit data/body was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: UrlSpec,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub content_type: String,
    pub body: Option<Vec<u8>>,
}

/// Per-test request options collected by the test builder.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub(crate) factory: Option<Box<dyn BodyFactory>>,
    pub(crate) data: Option<Value>,
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content_type: Option<String>,
    pub(crate) uri_params: BTreeMap<String, Value>,
    pub(crate) factory_overrides: JsonObject,
}

/// Merges `params` into `url`'s query string. An existing query string
/// is parsed and updated key-by-key, never appended to blindly.
pub fn merge_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let (path, existing) = match url.split_once('?') {
        Some((path, existing)) => (path, existing),
        None => (url, ""),
    };
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(existing.as_bytes())
        .into_owned()
        .collect();
    for (name, value) in params {
        match pairs.iter_mut().find(|(k, _)| k == name) {
            Some(pair) => pair.1 = value.clone(),
            None => pairs.push((name.clone(), value.clone())),
        }
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{}?{}", path, query)
}

/// Renders a JSON value the way it appears in a query string.
pub fn value_to_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolves the request body per the factory precedence chain:
/// explicit `body` > explicit `data` > per-test factory > scope factory
/// > registry route factory > registry resource-name factory > none.
/// Supplying both `body` and `data` is a hard error rather than a silent
/// pick.
pub(crate) fn resolve_body(
    scope: &ResourceScope,
    method: Method,
    options: &RequestOptions,
    examples: &Examples,
) -> Result<Option<Vec<u8>>, DataError> {
    if options.body.is_some() && options.data.is_some() {
        return Err(DataError::BodyAndData {
            method,
            path: scope.path().to_string(),
        });
    }
    if let Some(body) = &options.body {
        return Ok(Some(body.clone()));
    }
    let data = match &options.data {
        Some(data) => Some(data.clone()),
        None => {
            let factory = options
                .factory
                .clone()
                .or_else(|| scope.factory())
                .or_else(|| examples.get(&format!("{} {}", method, scope.path())))
                .or_else(|| examples.get(scope.name()));
            factory.map(|factory| factory.build(&options.factory_overrides))
        }
    };
    Ok(data.map(|data| data.to_string().into_bytes()))
}

/// Fills RAML-required query parameters that the caller did not supply
/// with schema-conformant generated values. Used for generated tests.
pub(crate) fn fill_required_query(
    node: &MethodNode,
    query: &mut Vec<(String, String)>,
    random: &mut RandomValueGenerator,
) -> Result<(), RequestError> {
    for param in node.required_query_params() {
        if query.iter().any(|(name, _)| name == &param.name) {
            continue;
        }
        let value = random
            .value_for(param)
            .map_err(|source| RequestError::Random {
                method: node.method,
                path: node.path.clone(),
                name: param.name.clone(),
                source,
            })?;
        query.push((param.name.clone(), value_to_query_string(&value)));
    }
    Ok(())
}

/// Fills body properties the request-body schema requires but the
/// resolved data lacks, generating values from each property's schema
/// fragment. Only creation/update bodies are touched, and only when the
/// resolved body is JSON-object shaped (or absent). Used for generated
/// tests.
pub(crate) fn fill_required_body(
    node: &MethodNode,
    body: Option<Vec<u8>>,
    random: &mut RandomValueGenerator,
) -> Result<Option<Vec<u8>>, RequestError> {
    if !matches!(node.method, Method::Post | Method::Put | Method::Patch) {
        return Ok(body);
    }
    let Some(schema) = node.body("application/json").and_then(|b| b.schema.as_ref()) else {
        return Ok(body);
    };
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(body);
    };
    let empty = serde_json::json!({});
    let properties = schema.get("properties").unwrap_or(&empty);

    let mut object = match &body {
        None => JsonObject::new(),
        Some(bytes) => match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(object)) => object,
            // not object-shaped, nothing to merge into
            _ => return Ok(body),
        },
    };
    for name in required.iter().filter_map(Value::as_str) {
        if object.contains_key(name) {
            continue;
        }
        let fragment = properties.get(name).cloned().unwrap_or(Value::Null);
        let value = random
            .schema_value(&fragment)
            .map_err(|source| RequestError::Random {
                method: node.method,
                path: node.path.clone(),
                name: name.to_string(),
                source,
            })?;
        object.insert(name.to_string(), value);
    }
    Ok(Some(Value::Object(object).to_string().into_bytes()))
}

/// Builds the request descriptor for `(scope, method)`. `autotest`
/// requests on dynamic paths defer URL resolution to the ledger and fill
/// required query parameters with generated values.
pub(crate) fn build_request(
    scope: &Rc<ResourceScope>,
    method: Method,
    mut options: RequestOptions,
    index: &ResourceIndex,
    examples: &Examples,
    random: &mut RandomValueGenerator,
    autotest: bool,
) -> Result<(RequestSpec, Option<MethodNode>), RequestError> {
    let node = match index.get(scope.path(), method) {
        Ok(node) => Some(node.clone()),
        Err(err) => {
            warn!(
                "adding test for undeclared method: {} (validation will be skipped)",
                err
            );
            None
        }
    };

    let mut body = resolve_body(scope, method, &options, examples)?;

    if autotest {
        if let Some(node) = &node {
            fill_required_query(node, &mut options.query, random)?;
            body = fill_required_body(node, body, random)?;
        }
    }

    let url = if autotest && scope.is_dynamic() {
        UrlSpec::DynamicItem {
            path: scope.path().to_string(),
            fallback: scope.resolve_path(&options.uri_params).ok(),
        }
    } else {
        let resolved = scope
            .resolve_path(&options.uri_params)
            .map_err(|source| RequestError::Path {
                method,
                path: scope.path().to_string(),
                source,
            })?;
        UrlSpec::Fixed(resolved)
    };
    debug!("built request {} {:?}", method, url);

    Ok((
        RequestSpec {
            method,
            url,
            query: options.query,
            headers: options.headers,
            content_type: options
                .content_type
                .unwrap_or_else(|| "application/json".to_string()),
            body,
        },
        node,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod query_merge {
        use super::super::merge_query;

        fn pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }

        #[test]
        fn appends_to_a_bare_url() {
            assert_eq!(
                merge_query("/users", &pairs(&[("limit", "10")])),
                "/users?limit=10"
            );
        }

        #[test]
        fn updates_existing_keys_instead_of_duplicating() {
            assert_eq!(
                merge_query("/users?limit=5&sort=asc", &pairs(&[("limit", "10")])),
                "/users?limit=10&sort=asc"
            );
        }

        #[test]
        fn keeps_unrelated_keys() {
            assert_eq!(
                merge_query("/users?sort=asc", &pairs(&[("limit", "10")])),
                "/users?sort=asc&limit=10"
            );
        }

        #[test]
        fn no_params_is_a_noop() {
            assert_eq!(merge_query("/users?a=1", &[]), "/users?a=1");
        }

        #[test]
        fn values_are_encoded() {
            assert_eq!(
                merge_query("/search", &pairs(&[("q", "a b")])),
                "/search?q=a+b"
            );
        }
    }

    mod body_resolution {
        use super::super::*;
        use crate::raml::{parse_str, ResourceIndex};
        use crate::suite::scope::ScopeOptions;
        use serde_json::json;

        const RAML: &str = r#"#%RAML 0.8
title: T
baseUri: http://api.example.com
/users:
  post:
    body:
      application/json:
        example: |
          {"username": "alice"}
  get:
"#;

        fn fixture() -> (ResourceIndex, Examples, Rc<ResourceScope>) {
            let index = ResourceIndex::build(&parse_str(RAML).unwrap());
            let examples = Examples::from_index(&index);
            let scope = Rc::new(ResourceScope::new(
                "/users",
                None,
                ScopeOptions::new(),
                &index,
            ));
            (index, examples, scope)
        }

        #[test]
        fn factory_chain_produces_the_example_body() {
            let (_, examples, scope) = fixture();
            let body = resolve_body(&scope, Method::Post, &RequestOptions::default(), &examples)
                .unwrap()
                .unwrap();
            let value: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(value, json!({"username": "alice"}));
        }

        #[test]
        fn explicit_data_wins_over_factories() {
            let (_, examples, scope) = fixture();
            let options = RequestOptions {
                data: Some(json!({"username": "bob"})),
                ..Default::default()
            };
            let body = resolve_body(&scope, Method::Post, &options, &examples)
                .unwrap()
                .unwrap();
            let value: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(value, json!({"username": "bob"}));
        }

        #[test]
        fn explicit_body_wins_over_data_rules() {
            let (_, examples, scope) = fixture();
            let options = RequestOptions {
                body: Some(b"raw".to_vec()),
                ..Default::default()
            };
            let body = resolve_body(&scope, Method::Post, &options, &examples)
                .unwrap()
                .unwrap();
            assert_eq!(body, b"raw".to_vec());
        }

        #[test]
        fn body_and_data_together_is_an_error() {
            let (_, examples, scope) = fixture();
            let options = RequestOptions {
                body: Some(b"raw".to_vec()),
                data: Some(json!({})),
                ..Default::default()
            };
            let err = resolve_body(&scope, Method::Post, &options, &examples).unwrap_err();
            assert!(matches!(err, DataError::BodyAndData { .. }));
        }

        #[test]
        fn no_factory_source_means_no_body() {
            let index = ResourceIndex::build(&parse_str(RAML).unwrap());
            let examples = Examples::new(); // empty registry
            let scope = Rc::new(ResourceScope::new(
                "/users",
                None,
                ScopeOptions::new(),
                &index,
            ));
            let body =
                resolve_body(&scope, Method::Get, &RequestOptions::default(), &examples).unwrap();
            assert!(body.is_none());
        }
    }

    mod build {
        use super::super::*;
        use crate::raml::parse_str;
        use crate::suite::scope::ScopeOptions;

        const RAML: &str = r#"#%RAML 0.8
title: T
baseUri: http://api.example.com/v1
/users:
  get:
    queryParameters:
      limit:
        type: integer
        required: true
        minimum: 3
        maximum: 3
  post:
    body:
      application/json:
        example: |
          {"username": "alice"}
  /{username}:
    uriParameters:
      username:
        type: string
        example: alice
    get:
"#;

        fn fixture() -> (ResourceIndex, Examples) {
            let index = ResourceIndex::build(&parse_str(RAML).unwrap());
            let examples = Examples::from_index(&index);
            (index, examples)
        }

        #[test]
        fn declared_requests_resolve_urls_eagerly() {
            let (index, examples) = fixture();
            let scope = Rc::new(ResourceScope::new("/users", None, ScopeOptions::new(), &index));
            let mut random = RandomValueGenerator::seeded(1);
            let (spec, node) = build_request(
                &scope,
                Method::Post,
                RequestOptions::default(),
                &index,
                &examples,
                &mut random,
                false,
            )
            .unwrap();
            assert_eq!(spec.url, UrlSpec::Fixed("/v1/users".to_string()));
            assert!(node.is_some());
            assert!(spec.body.is_some());
        }

        #[test]
        fn undeclared_methods_build_without_a_contract_node() {
            let (index, examples) = fixture();
            let scope = Rc::new(ResourceScope::new("/users", None, ScopeOptions::new(), &index));
            let mut random = RandomValueGenerator::seeded(1);
            let (_, node) = build_request(
                &scope,
                Method::Patch,
                RequestOptions::default(),
                &index,
                &examples,
                &mut random,
                false,
            )
            .unwrap();
            assert!(node.is_none());
        }

        #[test]
        fn autotests_fill_required_query_params() {
            let (index, examples) = fixture();
            let scope = Rc::new(ResourceScope::new("/users", None, ScopeOptions::new(), &index));
            let mut random = RandomValueGenerator::seeded(1);
            let (spec, _) = build_request(
                &scope,
                Method::Get,
                RequestOptions::default(),
                &index,
                &examples,
                &mut random,
                true,
            )
            .unwrap();
            // minimum == maximum pins the generated value
            assert_eq!(spec.query, vec![("limit".to_string(), "3".to_string())]);
        }

        #[test]
        fn declared_tests_do_not_invent_query_params() {
            let (index, examples) = fixture();
            let scope = Rc::new(ResourceScope::new("/users", None, ScopeOptions::new(), &index));
            let mut random = RandomValueGenerator::seeded(1);
            let (spec, _) = build_request(
                &scope,
                Method::Get,
                RequestOptions::default(),
                &index,
                &examples,
                &mut random,
                false,
            )
            .unwrap();
            assert!(spec.query.is_empty());
        }

        #[test]
        fn autotests_fill_required_body_properties() {
            const WITH_SCHEMA: &str = r#"#%RAML 0.8
title: T
baseUri: http://api.example.com
/users:
  post:
    body:
      application/json:
        example: |
          {"username": "alice"}
        schema: |
          {
            "type": "object",
            "properties": {
              "username": {"type": "string"},
              "age": {"type": "integer", "minimum": 30, "maximum": 30}
            },
            "required": ["username", "age"]
          }
"#;
            let index = ResourceIndex::build(&parse_str(WITH_SCHEMA).unwrap());
            let examples = Examples::from_index(&index);
            let scope = Rc::new(ResourceScope::new("/users", None, ScopeOptions::new(), &index));
            let mut random = RandomValueGenerator::seeded(9);
            let (spec, _) = build_request(
                &scope,
                Method::Post,
                RequestOptions::default(),
                &index,
                &examples,
                &mut random,
                true,
            )
            .unwrap();
            let body: Value = serde_json::from_slice(&spec.body.unwrap()).unwrap();
            // the example keeps its value; the missing required field is
            // generated within its schema bounds
            assert_eq!(body["username"], serde_json::json!("alice"));
            assert_eq!(body["age"], serde_json::json!(30));
        }

        #[test]
        fn dynamic_autotests_defer_to_the_ledger_with_a_fallback() {
            let (index, examples) = fixture();
            let users = Rc::new(ResourceScope::new("/users", None, ScopeOptions::new(), &index));
            let user = Rc::new(ResourceScope::new(
                "/{username}",
                Some(users),
                ScopeOptions::new(),
                &index,
            ));
            let mut random = RandomValueGenerator::seeded(1);
            let (spec, _) = build_request(
                &user,
                Method::Get,
                RequestOptions::default(),
                &index,
                &examples,
                &mut random,
                true,
            )
            .unwrap();
            assert_eq!(
                spec.url,
                UrlSpec::DynamicItem {
                    path: "/users/{username}".to_string(),
                    fallback: Some("/v1/users/alice".to_string()),
                }
            );
        }
    }
}
