//! Path/method index over a parsed RAML document.

use std::collections::BTreeMap;

use log::warn;
use serde_json::Value;
use thiserror::Error;

use crate::raml::document::{Method, MethodNode, RamlDocument};
use crate::raml::path;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexError {
    #[error("no method {method} declared on {path}")]
    NotFound { path: String, method: Method },
}

/// All methods declared on one path, in declaration order except that a
/// DELETE is always evaluated last (creation and reads before
/// destruction).
#[derive(Debug, Clone, PartialEq)]
pub struct PathMethods {
    pub path: String,
    pub methods: Vec<MethodNode>,
}

impl PathMethods {
    pub fn get(&self, method: Method) -> Option<&MethodNode> {
        self.methods.iter().find(|node| node.method == method)
    }
}

/// Insertion-ordered mapping from path to its method group, built once
/// from a [RamlDocument] and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    base_uri: String,
    base_path: String,
    entries: Vec<PathMethods>,
}

impl ResourceIndex {
    pub fn build(document: &RamlDocument) -> Self {
        let mut entries: Vec<PathMethods> = Vec::new();
        for node in &document.nodes {
            let entry = match entries.iter_mut().find(|e| e.path == node.path) {
                Some(entry) => entry,
                None => {
                    entries.push(PathMethods {
                        path: node.path.clone(),
                        methods: Vec::new(),
                    });
                    entries.last_mut().unwrap()
                }
            };
            if let Some(existing) = entry
                .methods
                .iter_mut()
                .find(|n| n.method == node.method)
            {
                warn!("duplicate declaration of {} {}", node.method, node.path);
                *existing = node.clone();
            } else {
                entry.methods.push(node.clone());
            }
        }
        for entry in &mut entries {
            move_delete_last(&mut entry.methods);
        }
        Self {
            base_uri: document.base_uri.clone(),
            base_path: path::path_from_uri(&document.base_uri),
            entries,
        }
    }

    /// The full base URI the document declares, e.g.
    /// `http://api.example.com/v1`.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// The path component of the base URI, prefixed to every resolved
    /// resource path.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn path(&self, path: &str) -> Option<&PathMethods> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Looks up one method node. Callers outside validation treat a miss
    /// as "untested feature"; validation reports it as a suite warning.
    pub fn get(&self, path: &str, method: Method) -> Result<&MethodNode, IndexError> {
        self.path(path)
            .and_then(|entry| entry.get(method))
            .ok_or_else(|| IndexError::NotFound {
                path: path.to_string(),
                method,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathMethods> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Example values for every URI parameter reachable from `path`
    /// (its own segment and all ancestors), keyed by parameter name.
    pub fn uri_example_args(&self, path: &str) -> BTreeMap<String, Value> {
        let mut args = BTreeMap::new();
        if let Some(entry) = self.path(path) {
            if let Some(node) = entry.methods.first() {
                for param in &node.uri_params {
                    if let Some(example) = &param.example {
                        args.insert(param.name.clone(), example.clone());
                    }
                }
            }
        }
        args
    }
}

fn move_delete_last(methods: &mut Vec<MethodNode>) {
    if let Some(pos) = methods.iter().position(|n| n.method == Method::Delete) {
        if pos != methods.len() - 1 {
            let delete = methods.remove(pos);
            methods.push(delete);
        }
    }
}
