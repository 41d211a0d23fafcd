//! Suite execution: runs every registered declaration in order and
//! assembles the consolidated report.

use std::thread;

use log::{info, warn};

use crate::autotest::ObjectLedger;
use crate::config::RunConfig;
use crate::http::{send_with_retry, HttpClient, HttpRequest, HttpResponse};
use crate::raml::{Method, ResourceIndex};
use crate::report::{Check, Report, TestReport};
use crate::suite::{merge_query, ApiSuite, HookContext, TestDeclaration, UrlSpec};
use crate::validate;

/// Executes an [ApiSuite] against one HTTP client. One test's failure
/// never prevents its siblings from running; everything lands in the
/// returned [Report].
pub struct Executor<C: HttpClient> {
    suite: ApiSuite,
    client: C,
    config: RunConfig,
}

impl<C: HttpClient> Executor<C> {
    pub fn new(suite: ApiSuite, client: C) -> Self {
        Self {
            suite,
            client,
            config: RunConfig::default(),
        }
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn execute(self) -> Report {
        let Executor {
            mut suite,
            client,
            config,
        } = self;
        let tests = suite.take_tests();
        let mut ledger = ObjectLedger::new();
        let mut report = Report::default();

        info!("executing {} tests", tests.len());
        for declaration in tests {
            let test_report = run_one(
                &mut suite,
                &client,
                &config,
                &mut ledger,
                &declaration,
                &mut report,
            );
            if test_report.failed() {
                warn!("{} failed", test_report.name);
            }
            report.push(test_report);
        }
        report
    }
}

fn run_one(
    suite: &mut ApiSuite,
    client: &dyn HttpClient,
    config: &RunConfig,
    ledger: &mut ObjectLedger,
    declaration: &TestDeclaration,
    report: &mut Report,
) -> TestReport {
    let mut test_report = TestReport::new(
        &declaration.name,
        declaration.method,
        declaration.scope.path(),
    );

    if let Some(error) = &declaration.setup_error {
        test_report.push(Check::fail("declare", error.clone()));
        return test_report;
    }

    let context = HookContext::new(declaration.method, declaration.scope.path());
    suite.hooks.run("before", &context);
    declaration.scope.hooks.borrow_mut().run("before", &context);

    perform(suite, client, config, ledger, declaration, report, &mut test_report);

    declaration.scope.hooks.borrow_mut().run("after", &context);
    suite.hooks.run("after", &context);

    test_report
}

/// The request/validate body of one test; early returns leave the
/// surrounding hooks to the caller.
fn perform(
    suite: &ApiSuite,
    client: &dyn HttpClient,
    config: &RunConfig,
    ledger: &mut ObjectLedger,
    declaration: &TestDeclaration,
    report: &mut Report,
    test_report: &mut TestReport,
) {
    let Some(spec) = &declaration.request else {
        test_report.push(Check::fail("declare", "no request was constructed"));
        return;
    };

    let url = match &spec.url {
        UrlSpec::Fixed(url) => url.clone(),
        UrlSpec::DynamicItem { path, fallback } => {
            match ledger.resolve(
                path,
                fallback.as_deref(),
                suite.index(),
                suite.examples(),
                client,
                config.retry_attempts,
                config.retry_delay(),
            ) {
                Ok(url) => url,
                Err(err) => {
                    test_report.push(Check::fail("request", err.to_string()));
                    return;
                }
            }
        }
    };

    let request = HttpRequest {
        method: declaration.method,
        url: merge_query(&url, &spec.query),
        content_type: spec.content_type.clone(),
        headers: spec.headers.clone(),
        body: spec.body.clone(),
    };

    let response = match send_with_retry(
        client,
        &request,
        config.retry_attempts,
        config.retry_delay(),
    ) {
        Ok(response) => response,
        Err(err) => {
            test_report.push(Check::fail("request", err.to_string()));
            return;
        }
    };

    track_lifecycle(ledger, suite.index(), declaration, &response);

    if declaration.autotest && config.settle_delay_ms > 0 {
        thread::sleep(config.settle_delay());
    }

    if let Some(expected) = declaration.expected_status {
        if response.status == expected {
            test_report.push(Check::pass("expected status"));
        } else {
            test_report.push(Check::fail(
                "expected status",
                format!("expected {}, got {}", expected, response.status),
            ));
        }
    }

    if declaration.validate {
        if declaration.node.is_none() {
            report.warn(format!(
                "{} {}: method not declared in RAML, contract checks skipped",
                declaration.method,
                declaration.scope.path()
            ));
        }
        test_report
            .checks
            .extend(validate::validate(declaration.node.as_ref(), &response));
    }

    if let Some(check) = &declaration.check {
        match check(&response) {
            Ok(()) => test_report.push(Check::pass("check")),
            Err(err) => test_report.push(Check::fail("check", err.to_string())),
        }
    }
}

/// Ledger bookkeeping observed on every executed test: a successful
/// creation with a `Location` header starts tracking the new object for
/// the path's dynamic children; a successful DELETE of a dynamic
/// resource stops tracking it.
fn track_lifecycle(
    ledger: &mut ObjectLedger,
    index: &ResourceIndex,
    declaration: &TestDeclaration,
    response: &HttpResponse,
) {
    if !response.is_success() {
        return;
    }
    match declaration.method {
        Method::Post => {
            if let Some(location) = response.header("location") {
                ledger.record_creation(index, declaration.scope.path(), location);
            }
        }
        Method::Delete => {
            if declaration.scope.is_dynamic() {
                ledger.forget(declaration.scope.path());
            }
        }
        _ => {}
    }
}
