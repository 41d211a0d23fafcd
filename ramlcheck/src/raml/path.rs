//! Path and URI-template helpers shared by the index, the scope tree and
//! the autotest generator.

use std::collections::{BTreeMap, HashMap, HashSet};

use chumsky::prelude::*;
use lazy_static::lazy_static;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("no value for URI parameter '{{{0}}}'")]
    MissingParam(String),
}

/// One piece of a URI template: either literal text or a `{name}`
/// parameter reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    Param(String),
}

/// Splits a URI template into literal and parameter segments.
/// e.g.
///     /users/{id}/profile
/// would return
///     [Literal("/users/"), Param("id"), Literal("/profile")]
///
/// A path that does not parse as a template (stray braces) is treated as
/// one opaque literal.
pub fn parse_template(path: &str) -> Vec<TemplateSegment> {
    let param = just::<_, _, extra::Err<Cheap>>('{')
        .ignore_then(none_of("{}").repeated().at_least(1).collect::<String>())
        .then_ignore(just('}'))
        .map(TemplateSegment::Param);
    let literal = none_of("{}")
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(TemplateSegment::Literal);
    let parser = param
        .or(literal)
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end());
    parser
        .parse(path)
        .into_output()
        .unwrap_or_else(|| vec![TemplateSegment::Literal(path.to_string())])
}

/// Names of all `{...}` parameters in `path`, in order of appearance.
pub fn template_params(path: &str) -> Vec<String> {
    parse_template(path)
        .into_iter()
        .filter_map(|segment| match segment {
            TemplateSegment::Param(name) => Some(name),
            TemplateSegment::Literal(_) => None,
        })
        .collect()
}

/// Fills `path`'s template parameters from `args`. Fails on the first
/// parameter with no binding.
pub fn format_template(path: &str, args: &BTreeMap<String, Value>) -> Result<String, PathError> {
    let mut out = String::new();
    for segment in parse_template(path) {
        match segment {
            TemplateSegment::Literal(text) => out.push_str(&text),
            TemplateSegment::Param(name) => match args.get(&name) {
                Some(value) => out.push_str(&value_to_segment(value)),
                None => return Err(PathError::MissingParam(name)),
            },
        }
    }
    Ok(out)
}

/// Renders a JSON value as a path segment the way it would appear in a
/// URL: strings bare, scalars via Display, anything else as compact JSON.
pub fn value_to_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// True when the last path segment (ignoring a trailing slash) is a
/// `{param}` template, e.g. `/users/{username}`.
pub fn is_dynamic(path: &str) -> bool {
    path.trim_end_matches('/').ends_with('}')
}

/// Absolute path of a scope declared with `segment` under an optional
/// parent path.
pub fn full_path(segment: &str, parent: Option<&str>) -> String {
    match parent {
        Some(parent) => format!("{}{}", parent, segment),
        None => segment.to_string(),
    }
}

/// The closest ancestor path of `path` that is not dynamic, i.e. `path`
/// with every trailing `{...}` segment removed. `None` when nothing
/// static remains or `path` is not dynamic to begin with.
pub fn static_parent(path: &str) -> Option<String> {
    if !is_dynamic(path) {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    let mut segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    while matches!(segments.last(), Some(last) if last.starts_with('{')) {
        segments.pop();
    }
    if segments.is_empty() {
        None
    } else {
        Some(format!("/{}", segments.join("/")))
    }
}

/// The path component of a base URI, with any RAML `{version}`-style
/// templating left intact for the caller to resolve.
/// e.g. `http://api.example.com/v1` returns `/v1`.
pub fn path_from_uri(uri: &str) -> String {
    match url::Url::parse(uri) {
        Ok(parsed) => {
            let path = parsed.path();
            if path == "/" {
                String::new()
            } else {
                path.to_string()
            }
        }
        // Not an absolute URL; keep whatever path-looking tail it has.
        Err(_) => match uri.find('/') {
            Some(idx) if uri.starts_with('/') => uri[idx..].to_string(),
            _ => String::new(),
        },
    }
}

/// Returns a (possibly nested) resource name for an API path.
///
/// Collection and item paths are treated the same: dynamic segments are
/// stripped, each remaining static segment is singularized (when
/// `singularize` is set) and the segments are joined with `.`.
/// Both `/users` and `/users/{username}` return `user`, while
/// `/users/{username}/profile` returns `user.profile`.
pub fn resource_name_from_path(path: &str, singularize: bool) -> String {
    parse_template(path)
        .into_iter()
        .filter_map(|segment| match segment {
            TemplateSegment::Literal(text) => Some(text),
            TemplateSegment::Param(_) => None,
        })
        .flat_map(|text| {
            text.split('/')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if singularize {
                        singular(s)
                    } else {
                        s.to_string()
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .join(".")
}

lazy_static! {
    static ref IRREGULARS: HashMap<&'static str, &'static str> = [
        ("people", "person"),
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("teeth", "tooth"),
        ("feet", "foot"),
        ("mice", "mouse"),
        ("geese", "goose"),
    ]
    .into_iter()
    .collect();
    static ref UNCOUNTABLE: HashSet<&'static str> = [
        "news",
        "series",
        "species",
        "settings",
        "information",
        "equipment",
        "money",
        "fish",
        "sheep",
        "deer",
    ]
    .into_iter()
    .collect();
}

/// Singular form of an English collection name. Rule-based with a small
/// irregular/uncountable table; resource names in API paths are tame
/// enough that this covers them.
pub fn singular(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if let Some(irregular) = IRREGULARS.get(lower.as_str()) {
        return irregular.to_string();
    }
    if UNCOUNTABLE.contains(lower.as_str()) {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["ses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod template {
        use super::super::*;

        #[test]
        fn splits_literals_and_params() {
            assert_eq!(
                parse_template("/users/{id}/profile"),
                vec![
                    TemplateSegment::Literal("/users/".into()),
                    TemplateSegment::Param("id".into()),
                    TemplateSegment::Literal("/profile".into()),
                ]
            );
        }

        #[test]
        fn static_path_is_one_literal() {
            assert_eq!(
                parse_template("/users"),
                vec![TemplateSegment::Literal("/users".into())]
            );
        }

        #[test]
        fn unbalanced_braces_fall_back_to_literal() {
            assert_eq!(
                parse_template("/users/{oops"),
                vec![TemplateSegment::Literal("/users/{oops".into())]
            );
        }

        #[test]
        fn param_names() {
            assert_eq!(
                template_params("/users/{username}/posts/{id}"),
                vec!["username".to_string(), "id".to_string()]
            );
        }
    }

    mod format {
        use super::super::*;
        use serde_json::json;
        use std::collections::BTreeMap;

        #[test]
        fn fills_params() {
            let mut args = BTreeMap::new();
            args.insert("username".to_string(), json!("alice"));
            assert_eq!(
                format_template("/users/{username}", &args),
                Ok("/users/alice".to_string())
            );
        }

        #[test]
        fn numeric_values_render_bare() {
            let mut args = BTreeMap::new();
            args.insert("id".to_string(), json!(42));
            assert_eq!(
                format_template("/posts/{id}", &args),
                Ok("/posts/42".to_string())
            );
        }

        #[test]
        fn missing_param_is_an_error() {
            let args = BTreeMap::new();
            assert_eq!(
                format_template("/users/{username}", &args),
                Err(PathError::MissingParam("username".to_string()))
            );
        }
    }

    mod names {
        use super::super::resource_name_from_path;

        #[test]
        fn collection_and_item_are_the_same_resource() {
            assert_eq!(resource_name_from_path("/users", true), "user");
            assert_eq!(resource_name_from_path("/users/{username}", true), "user");
        }

        #[test]
        fn nested_resources_make_dotted_names() {
            assert_eq!(
                resource_name_from_path("/users/{id}/profile", true),
                "user.profile"
            );
        }

        #[test]
        fn without_singularizing() {
            assert_eq!(resource_name_from_path("/users", false), "users");
        }
    }

    mod singularize {
        use super::super::singular;

        #[test]
        fn common_plurals() {
            assert_eq!(singular("users"), "user");
            assert_eq!(singular("stories"), "story");
            assert_eq!(singular("statuses"), "status");
            assert_eq!(singular("boxes"), "box");
        }

        #[test]
        fn irregular_and_uncountable() {
            assert_eq!(singular("people"), "person");
            assert_eq!(singular("settings"), "settings");
            assert_eq!(singular("news"), "news");
        }

        #[test]
        fn already_singular() {
            assert_eq!(singular("profile"), "profile");
            assert_eq!(singular("status"), "status");
        }
    }

    #[test]
    fn dynamic_paths() {
        assert!(is_dynamic("/users/{username}"));
        assert!(is_dynamic("/users/{username}/"));
        assert!(!is_dynamic("/users"));
        assert!(!is_dynamic("/users/{username}/profile"));
    }

    #[test]
    fn static_parents() {
        assert_eq!(static_parent("/users/{username}"), Some("/users".into()));
        assert_eq!(
            static_parent("/orgs/{org}/members/{id}"),
            Some("/orgs/{org}/members".into())
        );
        assert_eq!(static_parent("/users"), None);
        assert_eq!(static_parent("/{id}"), None);
    }

    #[test]
    fn base_uri_paths() {
        assert_eq!(path_from_uri("http://api.example.com/v1"), "/v1");
        assert_eq!(path_from_uri("http://api.example.com"), "");
        assert_eq!(path_from_uri("http://api.example.com/"), "");
    }

    #[test]
    fn segment_rendering() {
        assert_eq!(value_to_segment(&json!("alice")), "alice");
        assert_eq!(value_to_segment(&json!(7)), "7");
        assert_eq!(value_to_segment(&json!(true)), "true");
    }
}
