//! Turns RAML source into the typed [RamlDocument] model.
//!
//! The YAML syntax layer is serde_yaml's; this module only normalizes the
//! resulting value tree: resource keys (starting with `/`) recurse, method
//! keys become [MethodNode]s, named parameters and bodies become their
//! typed counterparts. JSON-encoded example/schema strings are decoded to
//! structured values where possible.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use serde_json::Value;
use serde_yaml::Value as Yaml;
use thiserror::Error;

use crate::raml::document::{
    BodySpec, Method, MethodNode, NamedParam, ParamType, RamlDocument, ResponseSpec,
};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read RAML file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse RAML source: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid RAML document: {0}")]
    Invalid(String),
}

/// True when `source` is RAML text rather than a path to a RAML file.
pub fn is_raml(source: &str) -> bool {
    source.starts_with("#%RAML")
}

/// Parses RAML from a file path or from literal source text (recognized
/// by its `#%RAML` header).
pub fn parse(path_or_text: &str) -> Result<RamlDocument, LoadError> {
    if is_raml(path_or_text) {
        parse_str(path_or_text)
    } else {
        parse_file(path_or_text)
    }
}

pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<RamlDocument, LoadError> {
    parse_str(&fs::read_to_string(path)?)
}

pub fn parse_str(text: &str) -> Result<RamlDocument, LoadError> {
    let root: Yaml = serde_yaml::from_str(text)?;
    let root = root
        .as_mapping()
        .ok_or_else(|| LoadError::Invalid("document root is not a mapping".to_string()))?;

    let title = str_entry(root, "title").unwrap_or_default();
    let media_type = str_entry(root, "mediaType");
    let mut base_uri = str_entry(root, "baseUri").unwrap_or_default();
    if let Some(version) = str_entry(root, "version") {
        base_uri = base_uri.replace("{version}", &version);
    }

    let mut nodes = Vec::new();
    for (key, value) in root {
        if let Some(path) = key.as_str().filter(|k| k.starts_with('/')) {
            collect_resource(path, value, &[], media_type.as_deref(), &mut nodes)?;
        }
    }

    Ok(RamlDocument {
        title,
        base_uri,
        media_type,
        nodes,
    })
}

/// Recursively flattens one resource mapping into [MethodNode]s.
/// `inherited_uri_params` carries the URI parameters of every ancestor
/// segment, ancestor-first.
fn collect_resource(
    path: &str,
    value: &Yaml,
    inherited_uri_params: &[NamedParam],
    default_media_type: Option<&str>,
    nodes: &mut Vec<MethodNode>,
) -> Result<(), LoadError> {
    // An empty resource (`/health:` with nothing under it) declares no
    // methods; only a non-mapping value is worth flagging.
    let Some(mapping) = value.as_mapping() else {
        if !value.is_null() {
            warn!("resource '{}' is not a mapping, skipping", path);
        }
        return Ok(());
    };

    let mut uri_params = inherited_uri_params.to_vec();
    if let Some(own) = mapping.get("uriParameters") {
        uri_params.extend(named_params(own, true));
    }

    for (key, entry) in mapping {
        let Some(key) = key.as_str() else { continue };
        if key.starts_with('/') {
            collect_resource(
                &format!("{}{}", path, key),
                entry,
                &uri_params,
                default_media_type,
                nodes,
            )?;
        } else if let Ok(method) = Method::from_str(key) {
            nodes.push(method_node(
                path,
                method,
                entry,
                &uri_params,
                default_media_type,
            ));
        }
    }
    Ok(())
}

fn method_node(
    path: &str,
    method: Method,
    value: &Yaml,
    uri_params: &[NamedParam],
    default_media_type: Option<&str>,
) -> MethodNode {
    let mut node = MethodNode {
        path: path.to_string(),
        method,
        uri_params: uri_params.to_vec(),
        ..Default::default()
    };
    let Some(mapping) = value.as_mapping() else {
        // A bare `get:` with no detail still declares the method.
        return node;
    };

    node.description = str_entry(mapping, "description");
    if let Some(params) = mapping.get("queryParameters") {
        node.query_params = named_params(params, false);
    }
    if let Some(headers) = mapping.get("headers") {
        node.headers = named_params(headers, false);
    }
    if let Some(body) = mapping.get("body") {
        node.bodies = bodies(body, default_media_type);
    }
    if let Some(responses) = mapping.get("responses") {
        node.responses = response_specs(responses, default_media_type, path);
    }
    node
}

fn response_specs(
    value: &Yaml,
    default_media_type: Option<&str>,
    path: &str,
) -> Vec<ResponseSpec> {
    let Some(mapping) = value.as_mapping() else {
        return Vec::new();
    };
    let mut specs = Vec::new();
    for (code, entry) in mapping {
        let code = match code {
            Yaml::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Yaml::String(s) => s.parse::<u16>().ok(),
            _ => None,
        };
        let Some(code) = code else {
            warn!("ignoring non-numeric response code on {}", path);
            continue;
        };
        let mut spec = ResponseSpec {
            code,
            description: None,
            headers: Vec::new(),
            bodies: Vec::new(),
        };
        if let Some(mapping) = entry.as_mapping() {
            spec.description = str_entry(mapping, "description");
            if let Some(headers) = mapping.get("headers") {
                spec.headers = named_params(headers, false);
            }
            if let Some(body) = mapping.get("body") {
                spec.bodies = bodies(body, default_media_type);
            }
        }
        specs.push(spec);
    }
    specs
}

fn bodies(value: &Yaml, default_media_type: Option<&str>) -> Vec<BodySpec> {
    let Some(mapping) = value.as_mapping() else {
        return Vec::new();
    };
    // Media-type keys contain a slash; a body given without them uses the
    // document default media type.
    let has_media_keys = mapping
        .iter()
        .any(|(k, _)| k.as_str().is_some_and(|k| k.contains('/')));
    if has_media_keys {
        mapping
            .iter()
            .filter_map(|(media, entry)| {
                let media = media.as_str()?;
                media.contains('/').then(|| body_spec(media, entry))
            })
            .collect()
    } else {
        let media = default_media_type.unwrap_or("application/json");
        vec![body_spec(media, value)]
    }
}

fn body_spec(media_type: &str, value: &Yaml) -> BodySpec {
    let mut spec = BodySpec {
        media_type: media_type.to_string(),
        ..Default::default()
    };
    if let Some(mapping) = value.as_mapping() {
        spec.example = mapping.get("example").map(structured_value);
        spec.schema = mapping.get("schema").map(structured_value);
    }
    spec
}

/// YAML value to JSON value, decoding JSON-encoded strings (the common
/// way RAML inlines examples and schemas) into structured data. Strings
/// that do not decode stay strings; the factory registry reports them.
fn structured_value(value: &Yaml) -> Value {
    if let Some(text) = value.as_str() {
        if let Ok(decoded) = serde_json::from_str::<Value>(text) {
            return decoded;
        }
    }
    yaml_to_json(value)
}

fn named_params(value: &Yaml, default_required: bool) -> Vec<NamedParam> {
    let Some(mapping) = value.as_mapping() else {
        return Vec::new();
    };
    mapping
        .iter()
        .filter_map(|(name, entry)| {
            let name = name.as_str()?;
            Some(named_param(name, entry, default_required))
        })
        .collect()
}

fn named_param(name: &str, value: &Yaml, default_required: bool) -> NamedParam {
    let mut param = NamedParam::new(name, ParamType::String);
    param.required = default_required;
    let Some(mapping) = value.as_mapping() else {
        return param;
    };
    if let Some(ty) = str_entry(mapping, "type") {
        param.param_type = ParamType::from_raml(&ty);
    }
    if let Some(required) = mapping.get("required").and_then(Yaml::as_bool) {
        param.required = required;
    }
    param.example = mapping.get("example").map(yaml_to_json);
    param.enum_values = mapping
        .get("enum")
        .and_then(Yaml::as_sequence)
        .map(|seq| seq.iter().map(yaml_to_json).collect())
        .unwrap_or_default();
    param.min_length = mapping.get("minLength").and_then(Yaml::as_u64);
    param.max_length = mapping.get("maxLength").and_then(Yaml::as_u64);
    param.minimum = mapping.get("minimum").and_then(Yaml::as_f64);
    param.maximum = mapping.get("maximum").and_then(Yaml::as_f64);
    param.pattern = str_entry(mapping, "pattern");
    param.default = mapping.get("default").map(yaml_to_json);
    param
}

fn str_entry(mapping: &serde_yaml::Mapping, key: &str) -> Option<String> {
    mapping.get(key).and_then(Yaml::as_str).map(str::to_string)
}

fn yaml_to_json(value: &Yaml) -> Value {
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().and_then(serde_json::Number::from_f64).map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(seq) => Value::Array(seq.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .iter()
                .filter_map(|(k, v)| {
                    let key = match k {
                        Yaml::String(s) => s.clone(),
                        Yaml::Number(n) => n.to_string(),
                        Yaml::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((key, yaml_to_json(v)))
                })
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SIMPLE: &str = r#"#%RAML 0.8
title: Example API
baseUri: http://api.example.com/{version}
version: v1
mediaType: application/json

/users:
  get:
    queryParameters:
      sort:
        type: string
        enum: [asc, desc]
      limit:
        type: integer
        required: true
        minimum: 1
        maximum: 100
    responses:
      200:
        headers:
          X-Total-Count:
            type: integer
            required: true
        body:
          application/json:
            schema: |
              {"type": "array"}
  post:
    body:
      application/json:
        example: |
          {"username": "alice"}
    responses:
      201:
        description: Created
  /{username}:
    uriParameters:
      username:
        type: string
        example: alice
    get:
      responses:
        200:
    delete:
      responses:
        204:
"#;

    #[test]
    fn parses_document_header() {
        let doc = parse_str(SIMPLE).unwrap();
        assert_eq!(doc.title, "Example API");
        assert_eq!(doc.base_uri, "http://api.example.com/v1");
        assert_eq!(doc.media_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn flattens_resources_in_declaration_order() {
        let doc = parse_str(SIMPLE).unwrap();
        let pairs: Vec<(&str, Method)> = doc
            .nodes
            .iter()
            .map(|n| (n.path.as_str(), n.method))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("/users", Method::Get),
                ("/users", Method::Post),
                ("/users/{username}", Method::Get),
                ("/users/{username}", Method::Delete),
            ]
        );
    }

    #[test]
    fn query_params_carry_constraints() {
        let doc = parse_str(SIMPLE).unwrap();
        let get = &doc.nodes[0];
        let sort = get.query_param("sort").unwrap();
        assert_eq!(sort.enum_values, vec![json!("asc"), json!("desc")]);
        assert!(!sort.required);
        let limit = get.query_param("limit").unwrap();
        assert_eq!(limit.param_type, ParamType::Integer);
        assert!(limit.required);
        assert_eq!(limit.minimum, Some(1.0));
        assert_eq!(limit.maximum, Some(100.0));
    }

    #[test]
    fn json_example_strings_are_decoded() {
        let doc = parse_str(SIMPLE).unwrap();
        let post = &doc.nodes[1];
        let body = post.body("application/json").unwrap();
        assert_eq!(body.example, Some(json!({"username": "alice"})));
    }

    #[test]
    fn response_schema_and_headers() {
        let doc = parse_str(SIMPLE).unwrap();
        let get = &doc.nodes[0];
        let ok = get.response(200).unwrap();
        assert_eq!(
            ok.body("application/json").unwrap().schema,
            Some(json!({"type": "array"}))
        );
        let total = ok.header("X-Total-Count").unwrap();
        assert_eq!(total.param_type, ParamType::Integer);
        assert!(total.required);
    }

    #[test]
    fn item_resources_inherit_uri_params_with_examples() {
        let doc = parse_str(SIMPLE).unwrap();
        let item_get = doc
            .nodes
            .iter()
            .find(|n| n.path == "/users/{username}" && n.method == Method::Get)
            .unwrap();
        let username = item_get.uri_param("username").unwrap();
        assert_eq!(username.example, Some(json!("alice")));
        // uriParameters default to required per RAML
        assert!(username.required);
    }

    #[test]
    fn sniffs_raml_text_vs_path() {
        assert!(is_raml("#%RAML 0.8\ntitle: x"));
        assert!(!is_raml("api.raml"));
    }

    #[test]
    fn reads_from_a_file() -> anyhow::Result<()> {
        use std::io::Write;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("api.raml");
        let mut file = std::fs::File::create(&path)?;
        file.write_all(SIMPLE.as_bytes())?;
        let doc = parse(path.to_str().unwrap())?;
        assert_eq!(doc.title, "Example API");
        Ok(())
    }
}
