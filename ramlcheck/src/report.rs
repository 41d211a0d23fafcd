//! Three-state outcomes collected per test and aggregated per run.

use std::fmt;

use itertools::Itertools;

use crate::raml::Method;

/// Outcome of one checkpoint within a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pass => "OK",
            Status::Fail => "FAIL",
            Status::Skip => "SKIP",
        })
    }
}

/// One checkpoint: what was checked and how it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub subject: String,
    pub status: Status,
    pub message: Option<String>,
}

impl Check {
    pub fn pass(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: Status::Pass,
            message: None,
        }
    }

    pub fn fail(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: Status::Fail,
            message: Some(message.into()),
        }
    }

    pub fn skip(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: Status::Skip,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}... {} ({})", self.subject, self.status, message),
            None => write!(f, "{}... {}", self.subject, self.status),
        }
    }
}

/// All checkpoints of one executed test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub checks: Vec<Check>,
}

impl TestReport {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            checks: Vec::new(),
        }
    }

    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    pub fn failed(&self) -> bool {
        self.checks.iter().any(|c| c.status == Status::Fail)
    }

    /// Overall status: any failure fails the test; all-skip is a skip.
    pub fn status(&self) -> Status {
        if self.failed() {
            Status::Fail
        } else if !self.checks.is_empty() && self.checks.iter().all(|c| c.status == Status::Skip) {
            Status::Skip
        } else {
            Status::Pass
        }
    }
}

/// Consolidated outcome of a whole run. Child reports merge upward so
/// one run yields one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub tests: Vec<TestReport>,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn push(&mut self, test: TestReport) {
        self.tests.push(test);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: Report) {
        self.tests.extend(other.tests);
        self.warnings.extend(other.warnings);
    }

    pub fn failed(&self) -> bool {
        self.tests.iter().any(TestReport::failed)
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for test in &self.tests {
            match test.status() {
                Status::Pass => counts.0 += 1,
                Status::Fail => counts.1 += 1,
                Status::Skip => counts.2 += 1,
            }
        }
        counts
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for test in &self.tests {
            writeln!(f, "{} [{}]", test.name, test.status())?;
            for check in &test.checks {
                writeln!(f, "  {}", check)?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            writeln!(f, "{}", self.warnings.iter().map(|w| format!("  {}", w)).join("\n"))?;
        }
        let (passed, failed, skipped) = self.counts();
        write!(
            f,
            "\n{} passed, {} failed, {} skipped",
            passed, failed, skipped
        )
    }
}
