//! Lifecycle tracking for dynamic (item-level) resources.
//!
//! Item tests should operate on an object that actually exists. The
//! ledger remembers the URL of the last object created under each
//! dynamic path; resolution falls back to RAML URI-parameter examples
//! and, as a last resort, creates an object through the nearest static
//! ancestor's POST.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::http::{send_with_retry, ClientError, HttpClient, HttpRequest};
use crate::raml::{self, Method, ResourceIndex, TemplateSegment};
use crate::suite::{Examples, JsonObject};

#[derive(Error, Debug)]
pub enum AutotestError {
    #[error(
        "no way to address dynamic resource {path}: no tracked object, \
         no URI-parameter example and no ancestor POST declared"
    )]
    NoParentCreator { path: String },

    #[error("creating an object for {path} failed: {reason}")]
    CreationFailed { path: String, reason: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Path-scoped mapping from dynamic resource path to the URL of its
/// last-created object. One per run; not shareable across workers.
#[derive(Debug, Default)]
pub struct ObjectLedger {
    created: HashMap<String, String>,
}

impl ObjectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self, path: &str) -> Option<&str> {
        self.created.get(path).map(String::as_str)
    }

    pub fn record(&mut self, path: impl Into<String>, url: impl Into<String>) {
        let (path, url) = (path.into(), url.into());
        debug!("tracking created object for {}: {}", path, url);
        self.created.insert(path, url);
    }

    /// Forgets the tracked object for `path` (after a successful
    /// DELETE); the next resolution falls through to example/creation.
    pub fn forget(&mut self, path: &str) -> bool {
        self.created.remove(path).is_some()
    }

    /// Records a creation observed on `posted_path` for every dynamic
    /// child path declared in the index, aligning the response
    /// `Location` header against each child's URI template.
    pub fn record_creation(&mut self, index: &ResourceIndex, posted_path: &str, location: &str) {
        for entry in index.iter() {
            if !raml::is_dynamic(&entry.path) {
                continue;
            }
            if raml::static_parent(&entry.path).as_deref() != Some(posted_path) {
                continue;
            }
            let template = format!("{}{}", index.base_path(), entry.path);
            let url = align_location(&template, location);
            self.record(entry.path.clone(), url);
        }
    }

    /// The base URL an item-level autotest should address, in order of
    /// preference: a previously tracked creation, the example-resolved
    /// template, or a fresh object created through the nearest static
    /// ancestor's POST.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &mut self,
        path: &str,
        fallback: Option<&str>,
        index: &ResourceIndex,
        examples: &Examples,
        client: &dyn HttpClient,
        attempts: u32,
        delay: Duration,
    ) -> Result<String, AutotestError> {
        if let Some(url) = self.tracked(path) {
            return Ok(url.to_string());
        }
        if let Some(url) = fallback {
            return Ok(url.to_string());
        }
        self.create_through_parent(path, index, examples, client, attempts, delay)
    }

    fn create_through_parent(
        &mut self,
        path: &str,
        index: &ResourceIndex,
        examples: &Examples,
        client: &dyn HttpClient,
        attempts: u32,
        delay: Duration,
    ) -> Result<String, AutotestError> {
        let parent = raml::static_parent(path).ok_or_else(|| AutotestError::NoParentCreator {
            path: path.to_string(),
        })?;
        if index.get(&parent, Method::Post).is_err() {
            return Err(AutotestError::NoParentCreator {
                path: path.to_string(),
            });
        }

        let parent_template = format!("{}{}", index.base_path(), parent);
        let parent_url = raml::format_template(&parent_template, &index.uri_example_args(&parent))
            .map_err(|err| AutotestError::CreationFailed {
                path: path.to_string(),
                reason: err.to_string(),
            })?;

        let body = examples
            .build(&format!("POST {}", parent), &JsonObject::new())
            .or_else(|| {
                examples.build(
                    &raml::resource_name_from_path(&parent, true),
                    &JsonObject::new(),
                )
            })
            .map(|data| data.to_string().into_bytes());

        info!("creating an object via POST {} for {}", parent_url, path);
        let mut request = HttpRequest::new(Method::Post, parent_url);
        request.body = body;
        let response = send_with_retry(client, &request, attempts, delay)?;

        if !response.is_success() {
            return Err(AutotestError::CreationFailed {
                path: path.to_string(),
                reason: format!("parent POST returned status {}", response.status),
            });
        }
        let location = response
            .header("location")
            .ok_or_else(|| AutotestError::CreationFailed {
                path: path.to_string(),
                reason: "parent POST response carries no Location header".to_string(),
            })?;

        let template = format!("{}{}", index.base_path(), path);
        let url = align_location(&template, location);
        self.record(path, url.clone());
        Ok(url)
    }
}

/// Aligns a `Location` header against a URI template to produce the
/// item URL: segment counts matching, each `{param}` position takes the
/// location's segment; otherwise the location path is used verbatim.
pub fn align_location(template: &str, location: &str) -> String {
    let location_path = if location.contains("://") {
        match url::Url::parse(location) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => location.to_string(),
        }
    } else {
        location.to_string()
    };

    let template_segments: Vec<&str> = template.split('/').collect();
    let location_segments: Vec<&str> = location_path.trim_end_matches('/').split('/').collect();
    if template_segments.len() != location_segments.len() {
        return location_path;
    }

    let aligned: Vec<String> = template_segments
        .iter()
        .zip(&location_segments)
        .map(|(template_segment, location_segment)| {
            let is_param = matches!(
                raml::parse_template(template_segment).as_slice(),
                [TemplateSegment::Param(_)]
            );
            if is_param {
                location_segment.to_string()
            } else {
                template_segment.to_string()
            }
        })
        .collect();
    aligned.join("/")
}
