//! Test-suite declaration: resource scopes, method tests and the
//! suite-wide registry the executor consumes.
//!
//! Declaration is explicit: a scope callback receives a [ScopeHandle]
//! and registers child scopes and tests on it; every declaration lands
//! in the suite's registry as a strongly-typed [TestDeclaration].

use std::rc::Rc;

use log::warn;
use serde_json::Value;

use crate::http::HttpResponse;
use crate::raml::{self, Method, MethodNode, RamlDocument, ResourceIndex};
use crate::random::RandomValueGenerator;

pub use factory::{BodyFactory, DataError, ExampleFactory, Examples, FnFactory, JsonObject};
pub use hooks::{Condition, HookContext, HookError, Hooks};
pub use request::{merge_query, RequestError, RequestOptions, RequestSpec, UrlSpec};
pub use scope::{ResourceScope, ScopeOptions};

mod factory;
mod hooks;
mod request;
mod scope;

/// Custom assertion run against the response after contract validation.
pub type CheckFn = Box<dyn Fn(&HttpResponse) -> anyhow::Result<()>>;

/// One registered test: the request to make, the contract to validate
/// against and everything the executor needs to run it.
pub struct TestDeclaration {
    pub name: String,
    pub scope: Rc<ResourceScope>,
    pub method: Method,
    /// The RAML contract node; absent when the method was not declared,
    /// in which case validation is skipped with a suite warning.
    pub node: Option<MethodNode>,
    /// Absent only when construction failed (generated tests record the
    /// failure instead of aborting the run).
    pub request: Option<RequestSpec>,
    pub setup_error: Option<String>,
    pub expected_status: Option<u16>,
    pub validate: bool,
    pub autotest: bool,
    pub check: Option<CheckFn>,
}

/// An API test suite bound to one RAML document.
pub struct ApiSuite {
    index: ResourceIndex,
    examples: Examples,
    random: RandomValueGenerator,
    scopes: Vec<Rc<ResourceScope>>,
    tests: Vec<TestDeclaration>,
    pub hooks: Hooks,
}

impl ApiSuite {
    pub fn new(document: RamlDocument) -> Self {
        let index = ResourceIndex::build(&document);
        let examples = Examples::from_index(&index);
        Self {
            index,
            examples,
            random: RandomValueGenerator::new(),
            scopes: Vec::new(),
            tests: Vec::new(),
            hooks: Hooks::new(),
        }
    }

    /// Swaps in a different value generator (e.g. a seeded one).
    pub fn with_random(mut self, random: RandomValueGenerator) -> Self {
        self.random = random;
        self
    }

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    pub fn examples(&self) -> &Examples {
        &self.examples
    }

    pub fn tests(&self) -> &[TestDeclaration] {
        &self.tests
    }

    pub fn scopes(&self) -> &[Rc<ResourceScope>] {
        &self.scopes
    }

    /// Declares a resource scope; the callback registers tests and
    /// nested scopes on the handle.
    pub fn resource<F>(&mut self, path: &str, f: F) -> Result<(), RequestError>
    where
        F: FnOnce(&mut ScopeHandle) -> Result<(), RequestError>,
    {
        self.resource_with(path, ScopeOptions::new(), f)
    }

    pub fn resource_with<F>(
        &mut self,
        path: &str,
        options: ScopeOptions,
        f: F,
    ) -> Result<(), RequestError>
    where
        F: FnOnce(&mut ScopeHandle) -> Result<(), RequestError>,
    {
        self.declare_scope(path, options, None, f)
    }

    pub(crate) fn declare_scope<F>(
        &mut self,
        segment: &str,
        options: ScopeOptions,
        parent: Option<Rc<ResourceScope>>,
        f: F,
    ) -> Result<(), RequestError>
    where
        F: FnOnce(&mut ScopeHandle) -> Result<(), RequestError>,
    {
        let full = raml::full_path(segment, parent.as_ref().map(|p| p.path()));
        if !self.index.contains_path(&full) {
            warn!("declaring resource scope {}: resource not declared in RAML", full);
        }
        let scope = Rc::new(scope::ResourceScope::new(
            segment,
            parent,
            options,
            &self.index,
        ));
        self.scopes.push(scope.clone());
        let mut handle = ScopeHandle { suite: self, scope };
        f(&mut handle)
    }

    /// True when an explicitly declared (non-generated) test already
    /// covers `(method, path)`.
    pub fn covered(&self, method: Method, path: &str) -> bool {
        self.tests
            .iter()
            .any(|t| !t.autotest && t.method == method && t.scope.path() == path)
    }

    /// Generates default tests for every declared method/path pair not
    /// already covered; see [crate::autotest].
    pub fn autotest(&mut self, options: &crate::autotest::AutotestOptions) {
        crate::autotest::generate(self, options);
    }

    pub(crate) fn push_declaration(&mut self, declaration: TestDeclaration) {
        self.tests.push(declaration);
    }

    pub(crate) fn take_tests(&mut self) -> Vec<TestDeclaration> {
        std::mem::take(&mut self.tests)
    }

    pub(crate) fn build_parts(
        &mut self,
    ) -> (&ResourceIndex, &Examples, &mut RandomValueGenerator) {
        (&self.index, &self.examples, &mut self.random)
    }
}

/// Handle passed to a scope-declaration callback; registers method
/// tests, nested scopes and scope-local hooks.
pub struct ScopeHandle<'a> {
    suite: &'a mut ApiSuite,
    scope: Rc<ResourceScope>,
}

impl<'a> ScopeHandle<'a> {
    pub fn path(&self) -> &str {
        self.scope.path()
    }

    pub fn scope(&self) -> &Rc<ResourceScope> {
        &self.scope
    }

    /// Declares a nested resource scope under this one.
    pub fn resource<F>(&mut self, segment: &str, f: F) -> Result<(), RequestError>
    where
        F: FnOnce(&mut ScopeHandle) -> Result<(), RequestError>,
    {
        self.resource_with(segment, ScopeOptions::new(), f)
    }

    pub fn resource_with<F>(
        &mut self,
        segment: &str,
        options: ScopeOptions,
        f: F,
    ) -> Result<(), RequestError>
    where
        F: FnOnce(&mut ScopeHandle) -> Result<(), RequestError>,
    {
        let parent = self.scope.clone();
        self.suite.declare_scope(segment, options, Some(parent), f)
    }

    /// Starts a test declaration for `method` on this scope.
    pub fn method(&mut self, method: Method) -> TestBuilder<'_> {
        TestBuilder {
            suite: &mut *self.suite,
            scope: self.scope.clone(),
            method,
            options: RequestOptions::default(),
            name: None,
            expected_status: None,
            validate: true,
            autotest: false,
        }
    }

    pub fn get(&mut self) -> TestBuilder<'_> {
        self.method(Method::Get)
    }

    pub fn post(&mut self) -> TestBuilder<'_> {
        self.method(Method::Post)
    }

    pub fn put(&mut self) -> TestBuilder<'_> {
        self.method(Method::Put)
    }

    pub fn patch(&mut self) -> TestBuilder<'_> {
        self.method(Method::Patch)
    }

    pub fn delete(&mut self) -> TestBuilder<'_> {
        self.method(Method::Delete)
    }

    pub fn head(&mut self) -> TestBuilder<'_> {
        self.method(Method::Head)
    }

    pub fn options(&mut self) -> TestBuilder<'_> {
        self.method(Method::Options)
    }

    /// True when a declared test already covers `method` on this scope.
    pub fn covered(&self, method: Method) -> bool {
        self.suite.covered(method, self.scope.path())
    }

    /// Records a generated test whose construction failed; it reports as
    /// a failure at execution instead of aborting its siblings.
    pub(crate) fn push_setup_failure(&mut self, method: Method, error: &RequestError) {
        let scope = self.scope.clone();
        self.suite.push_declaration(TestDeclaration {
            name: format!("{} {}", method, scope.path()),
            scope,
            method,
            node: None,
            request: None,
            setup_error: Some(error.to_string()),
            expected_status: None,
            validate: false,
            autotest: true,
            check: None,
        });
    }

    /// Registers a scope-local before-hook.
    pub fn before<F>(&mut self, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.scope.hooks.borrow_mut().before(callback);
    }

    pub fn before_when<F>(&mut self, condition: Condition, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.scope.hooks.borrow_mut().before_when(condition, callback);
    }

    pub fn after<F>(&mut self, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.scope.hooks.borrow_mut().after(callback);
    }

    pub fn after_when<F>(&mut self, condition: Condition, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.scope.hooks.borrow_mut().after_when(condition, callback);
    }
}

/// Collects per-test request options, then registers the declaration.
pub struct TestBuilder<'a> {
    suite: &'a mut ApiSuite,
    scope: Rc<ResourceScope>,
    method: Method,
    options: RequestOptions,
    name: Option<String>,
    expected_status: Option<u16>,
    validate: bool,
    autotest: bool,
}

impl<'a> TestBuilder<'a> {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Body data to JSON-encode. Mutually exclusive with [Self::body].
    pub fn data(mut self, data: Value) -> Self {
        self.options.data = Some(data);
        self
    }

    /// Raw request body, sent as-is.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.options.body = Some(body.into());
        self
    }

    /// Explicit factory for this test, ahead of the scope and registry
    /// factories.
    pub fn factory(mut self, factory: impl BodyFactory + 'static) -> Self {
        self.options.factory = Some(Box::new(factory));
        self
    }

    /// Override fields handed to whichever factory produces the body.
    pub fn factory_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.factory_overrides.insert(key.into(), value.into());
        self
    }

    /// Query parameter merged into the resolved URL's query string.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.options.content_type = Some(content_type.into());
        self
    }

    /// Per-test URI parameter override.
    pub fn uri_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.uri_params.insert(name.into(), value.into());
        self
    }

    /// Expect this exact status code in addition to contract checks.
    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Skip contract validation for this test.
    pub fn no_validate(mut self) -> Self {
        self.validate = false;
        self
    }

    pub(crate) fn autotest(mut self) -> Self {
        self.autotest = true;
        self
    }

    /// Registers the default test: send the request, validate the
    /// response against the contract.
    pub fn register(self) -> Result<(), RequestError> {
        self.finish(None)
    }

    /// Registers the test with a custom assertion, run after contract
    /// validation.
    pub fn check<F>(self, check: F) -> Result<(), RequestError>
    where
        F: Fn(&HttpResponse) -> anyhow::Result<()> + 'static,
    {
        self.finish(Some(Box::new(check)))
    }

    fn finish(self, check: Option<CheckFn>) -> Result<(), RequestError> {
        let TestBuilder {
            suite,
            scope,
            method,
            options,
            name,
            expected_status,
            validate,
            autotest,
        } = self;
        let (index, examples, random) = suite.build_parts();
        let (request, node) =
            request::build_request(&scope, method, options, index, examples, random, autotest)?;
        let name = name.unwrap_or_else(|| format!("{} {}", method, scope.path()));
        suite.push_declaration(TestDeclaration {
            name,
            scope,
            method,
            node,
            request: Some(request),
            setup_error: None,
            expected_status,
            validate,
            autotest,
            check,
        });
        Ok(())
    }
}
