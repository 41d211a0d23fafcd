//! Resource scopes: the declaration tree mirroring the RAML resource
//! nesting.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::raml::{self, PathError, ResourceIndex};
use crate::suite::factory::BodyFactory;
use crate::suite::hooks::Hooks;

/// Declaration-time options for a scope: an explicit body factory and
/// explicit URI parameter bindings overriding the RAML examples.
#[derive(Clone, Default)]
pub struct ScopeOptions {
    pub(crate) factory: Option<Box<dyn BodyFactory>>,
    pub(crate) uri_params: BTreeMap<String, Value>,
}

impl ScopeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(mut self, factory: impl BodyFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub fn uri_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.uri_params.insert(name.into(), value.into());
        self
    }
}

/// One node of the declaration tree, bound to an absolute RAML path.
/// Lives for the duration of the suite; the suite owns the full list.
pub struct ResourceScope {
    path: String,
    name: String,
    parent: Option<Rc<ResourceScope>>,
    base_path: String,
    uri_params: BTreeMap<String, Value>,
    factory: Option<Box<dyn BodyFactory>>,
    pub(crate) hooks: RefCell<Hooks>,
}

impl ResourceScope {
    /// Builds a scope for `segment` under `parent`. URI parameter
    /// bindings start from the RAML-declared examples for every dynamic
    /// segment of the full path, overridden by the parent scope's
    /// bindings, overridden by this scope's own `options`.
    pub(crate) fn new(
        segment: &str,
        parent: Option<Rc<ResourceScope>>,
        options: ScopeOptions,
        index: &ResourceIndex,
    ) -> Self {
        let path = raml::full_path(segment, parent.as_ref().map(|p| p.path()));
        let mut uri_params = index.uri_example_args(&path);
        if let Some(parent) = &parent {
            for (name, value) in &parent.uri_params {
                uri_params.insert(name.clone(), value.clone());
            }
        }
        for (name, value) in options.uri_params {
            uri_params.insert(name, value);
        }
        Self {
            name: raml::resource_name_from_path(&path, true),
            base_path: index.base_path().to_string(),
            path,
            parent,
            uri_params,
            factory: options.factory,
            hooks: RefCell::new(Hooks::new()),
        }
    }

    /// The absolute RAML path, possibly containing `{param}` segments.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Dotted singular resource name, e.g. `user.profile`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<ResourceScope>> {
        self.parent.as_ref()
    }

    /// The path including the base-URI path prefix, still templated.
    pub fn full_path(&self) -> String {
        format!("{}{}", self.base_path, self.path)
    }

    /// True when the last path segment is a `{param}` template.
    pub fn is_dynamic(&self) -> bool {
        raml::is_dynamic(&self.path)
    }

    pub fn uri_params(&self) -> &BTreeMap<String, Value> {
        &self.uri_params
    }

    /// Fills the full templated path with the stored URI parameter
    /// bindings, `overrides` winning.
    pub fn resolve_path(
        &self,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<String, PathError> {
        let mut args = self.uri_params.clone();
        for (name, value) in overrides {
            args.insert(name.clone(), value.clone());
        }
        raml::format_template(&self.full_path(), &args)
    }

    /// Shortcut for [ResourceScope::resolve_path] with no overrides.
    pub fn resolved_path(&self) -> Result<String, PathError> {
        self.resolve_path(&BTreeMap::new())
    }

    /// The explicitly declared factory for this scope. A dynamic scope
    /// without one defers to the nearest static ancestor's, recursing;
    /// registry fallbacks (route and resource-name keys) are the request
    /// builder's next tiers, and an item resource ends up reusing its
    /// collection's creation factory there because both share a resource
    /// name.
    pub fn factory(&self) -> Option<Box<dyn BodyFactory>> {
        if let Some(factory) = &self.factory {
            return Some(factory.clone());
        }
        if self.is_dynamic() {
            return self.parent.as_ref().and_then(|p| p.factory());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raml::{parse_str, ResourceIndex};
    use serde_json::json;

    const RAML: &str = r#"#%RAML 0.8
title: T
baseUri: http://api.example.com/v1
/users:
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
    /profile:
      get:
"#;

    fn index() -> ResourceIndex {
        ResourceIndex::build(&parse_str(RAML).unwrap())
    }

    fn scope(segment: &str, parent: Option<Rc<ResourceScope>>, index: &ResourceIndex) -> Rc<ResourceScope> {
        Rc::new(ResourceScope::new(
            segment,
            parent,
            ScopeOptions::new(),
            index,
        ))
    }

    #[test]
    fn nested_paths_concatenate() {
        let index = index();
        let users = scope("/users", None, &index);
        let user = scope("/{username}", Some(users.clone()), &index);
        let profile = scope("/profile", Some(user.clone()), &index);
        assert_eq!(users.path(), "/users");
        assert_eq!(user.path(), "/users/{username}");
        assert_eq!(profile.path(), "/users/{username}/profile");
        assert_eq!(profile.name(), "user.profile");
    }

    #[test]
    fn dynamic_detection() {
        let index = index();
        let users = scope("/users", None, &index);
        let user = scope("/{username}", Some(users.clone()), &index);
        assert!(!users.is_dynamic());
        assert!(user.is_dynamic());
    }

    #[test]
    fn uri_params_default_to_raml_examples() {
        let index = index();
        let users = scope("/users", None, &index);
        let user = scope("/{username}", Some(users), &index);
        assert_eq!(
            user.resolved_path().unwrap(),
            "/v1/users/alice".to_string()
        );
    }

    #[test]
    fn declared_params_override_examples() {
        let index = index();
        let users = scope("/users", None, &index);
        let user = Rc::new(ResourceScope::new(
            "/{username}",
            Some(users),
            ScopeOptions::new().uri_param("username", "bob"),
            &index,
        ));
        assert_eq!(user.resolved_path().unwrap(), "/v1/users/bob");
    }

    #[test]
    fn per_call_overrides_win_over_everything() {
        let index = index();
        let users = scope("/users", None, &index);
        let user = scope("/{username}", Some(users), &index);
        let mut overrides = BTreeMap::new();
        overrides.insert("username".to_string(), json!("carol"));
        assert_eq!(
            user.resolve_path(&overrides).unwrap(),
            "/v1/users/carol"
        );
    }

    #[test]
    fn missing_uri_param_is_an_error() {
        let index = index();
        // no parent scope, no example reachable for {org}
        let orgs = scope("/orgs/{org}", None, &index);
        assert_eq!(
            orgs.resolved_path(),
            Err(PathError::MissingParam("org".to_string()))
        );
    }

    #[test]
    fn dynamic_scope_defers_to_static_ancestor_factory() {
        let index = index();
        let users = Rc::new(ResourceScope::new(
            "/users",
            None,
            ScopeOptions::new()
                .factory(crate::suite::factory::FnFactory(
                    |_: &crate::suite::factory::JsonObject| json!({"custom": true}),
                )),
            &index,
        ));
        let user = scope("/{username}", Some(users.clone()), &index);
        let factory = user.factory().unwrap();
        assert_eq!(factory.build(&Default::default()), json!({"custom": true}));
    }

    #[test]
    fn scope_without_explicit_factory_has_none() {
        let index = index();
        let users = scope("/users", None, &index);
        let user = scope("/{username}", Some(users.clone()), &index);
        assert!(users.factory().is_none());
        assert!(user.factory().is_none());
    }
}
