//! The narrow HTTP capability surface the engine depends on.
//!
//! Everything upstream builds [HttpRequest]s; anything able to execute
//! one and hand back an [HttpResponse] can drive a run. The live
//! implementation is [ReqwestClient]; tests use in-crate fakes.

use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::raml::Method;

pub use client::ReqwestClient;

mod client;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A fully resolved request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute path plus query string; the client supplies scheme and
    /// host.
    pub url: String,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            content_type: "application/json".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// An observed response, reduced to what validation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, value: &Value) -> Self {
        self.body = value.to_string().into_bytes();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// The capability interface a caller selects explicitly; the engine
/// never probes transports at runtime.
pub trait HttpClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// Synchronous fixed-delay retry: re-issues `request` up to `attempts`
/// times total, sleeping `delay` between attempts, re-raising the last
/// error when every attempt fails. No jitter, no backoff growth.
pub fn send_with_retry(
    client: &dyn HttpClient,
    request: &HttpRequest,
    attempts: u32,
    delay: Duration,
) -> Result<HttpResponse, ClientError> {
    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 0..attempts {
        if attempt > 0 {
            thread::sleep(delay);
            debug!(
                "retrying {} {} (attempt {}/{})",
                request.method,
                request.url,
                attempt + 1,
                attempts
            );
        }
        match client.send(request) {
            Ok(response) => return Ok(response),
            Err(err) => {
                warn!("{} {}: {}", request.method, request.url, err);
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ClientError::Transport("no attempts made".to_string())))
}
