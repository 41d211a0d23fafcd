//! Ordered before/after callback registries with pattern-based
//! filtering.
//!
//! Patterns take the form `"METHOD /path/glob"`, `"METHOD"` alone, or
//! `"/path/glob"` alone. Method matching is case-insensitive; path
//! matching uses shell-glob semantics. Callbacks always run in
//! registration order.

use std::collections::HashMap;
use std::str::FromStr;

use globset::{Glob, GlobMatcher};
use thiserror::Error;

use crate::raml::Method;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("invalid hook pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

/// The request a hook fires around: its method and its template path
/// (before URI parameters are filled or the base path is prepended).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    pub method: Method,
    pub path: String,
}

impl HookContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

/// One parsed `only`/`exclude` pattern.
#[derive(Debug, Clone)]
struct Pattern {
    method: Option<String>,
    path: Option<GlobMatcher>,
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self, HookError> {
        let raw = raw.trim();
        let (method, path) = if let Some((method, path)) = raw.split_once(' ') {
            (Some(method), Some(path.trim()))
        } else if raw.starts_with('/') {
            (None, Some(raw))
        } else {
            (Some(raw), None)
        };
        let path = match path {
            Some(glob) => Some(
                Glob::new(glob)
                    .map_err(|source| HookError::InvalidPattern {
                        pattern: raw.to_string(),
                        source,
                    })?
                    .compile_matcher(),
            ),
            None => None,
        };
        Ok(Self {
            method: method.map(|m| m.to_ascii_uppercase()),
            path,
        })
    }

    fn matches(&self, context: &HookContext) -> bool {
        if let Some(method) = &self.method {
            match Method::from_str(method) {
                Ok(method) if method == context.method => {}
                _ => return false,
            }
        }
        if let Some(glob) = &self.path {
            if !glob.is_match(&context.path) {
                return false;
            }
        }
        true
    }
}

/// Filter conditions attached to one callback. With `only` set, the
/// context must match at least one pattern; with `exclude` set, it must
/// match none; with both, both requirements hold.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    only: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Condition {
    pub fn new(only: &[&str], exclude: &[&str]) -> Result<Self, HookError> {
        Ok(Self {
            only: only
                .iter()
                .map(|raw| Pattern::parse(raw))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|raw| Pattern::parse(raw))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn only(patterns: &[&str]) -> Result<Self, HookError> {
        Self::new(patterns, &[])
    }

    pub fn exclude(patterns: &[&str]) -> Result<Self, HookError> {
        Self::new(&[], patterns)
    }

    fn allows(&self, context: &HookContext) -> bool {
        if !self.only.is_empty() && !self.only.iter().any(|p| p.matches(context)) {
            return false;
        }
        if self.exclude.iter().any(|p| p.matches(context)) {
            return false;
        }
        true
    }
}

pub type HookFn = Box<dyn FnMut(&HookContext)>;

struct HookEntry {
    callback: HookFn,
    condition: Condition,
}

/// Name-keyed callback registry. Appended to during declaration, only
/// read (and run) during execution.
#[derive(Default)]
pub struct Hooks {
    hooks: HashMap<String, Vec<HookEntry>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, name: &str, condition: Condition, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.hooks
            .entry(name.to_string())
            .or_default()
            .push(HookEntry {
                callback: Box::new(callback),
                condition,
            });
    }

    pub fn before<F>(&mut self, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.add("before", Condition::default(), callback);
    }

    pub fn before_when<F>(&mut self, condition: Condition, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.add("before", condition, callback);
    }

    pub fn after<F>(&mut self, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.add("after", Condition::default(), callback);
    }

    pub fn after_when<F>(&mut self, condition: Condition, callback: F)
    where
        F: FnMut(&HookContext) + 'static,
    {
        self.add("after", condition, callback);
    }

    /// Runs every callback registered under `name` whose condition
    /// allows `context`, in registration order.
    pub fn run(&mut self, name: &str, context: &HookContext) {
        let Some(entries) = self.hooks.get_mut(name) else {
            return;
        };
        for entry in entries {
            if entry.condition.allows(context) {
                (entry.callback)(context);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }
}
