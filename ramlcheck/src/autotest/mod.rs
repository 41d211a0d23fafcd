//! Default-test synthesis for every declared method/path pair.

use log::warn;

use crate::suite::{ApiSuite, ScopeOptions};

pub use ledger::{align_location, AutotestError, ObjectLedger};

mod ledger;

/// Options for generated-test synthesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutotestOptions {
    /// Generate a test even for pairs already covered by a declared
    /// test. Off by default: declared tests suppress their generated
    /// counterparts.
    pub override_existing: bool,
}

/// Walks the resource index and registers one generated test per
/// `(method, path)` pair not otherwise covered. Paths run parents-first
/// (a collection's creation precedes its items' tests even when the
/// document declares them in another order); within a path the index
/// already evaluates DELETE last.
pub fn generate(suite: &mut ApiSuite, options: &AutotestOptions) {
    let mut entries: Vec<(String, Vec<crate::raml::Method>)> = suite
        .index()
        .iter()
        .map(|entry| {
            (
                entry.path.clone(),
                entry.methods.iter().map(|node| node.method).collect(),
            )
        })
        .collect();
    entries.sort_by_key(|(path, _)| segment_count(path));

    for (path, methods) in entries {
        let declared = suite.declare_scope(&path, ScopeOptions::new(), None, |handle| {
            for method in methods {
                if !options.override_existing && handle.covered(method) {
                    continue;
                }
                if let Err(err) = handle.method(method).autotest().register() {
                    warn!("could not construct generated test {} {}: {}", method, path, err);
                    handle.push_setup_failure(method, &err);
                }
            }
            Ok(())
        });
        if let Err(err) = declared {
            warn!("skipping generated tests for {}: {}", path, err);
        }
    }
}

fn segment_count(path: &str) -> usize {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).count()
}
