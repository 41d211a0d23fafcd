use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// An HTTP method declared on a RAML resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Get
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(()),
        }
    }
}

/// Declared type of a RAML named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Date,
    File,
    Other(std::string::String),
}

impl ParamType {
    pub fn from_raml(s: &str) -> Self {
        match s {
            "string" => ParamType::String,
            "number" => ParamType::Number,
            "integer" => ParamType::Integer,
            "boolean" => ParamType::Boolean,
            "date" => ParamType::Date,
            "file" => ParamType::File,
            other => ParamType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Date => "date",
            ParamType::File => "file",
            ParamType::Other(s) => s,
        }
    }
}

/// A RAML named parameter (query, URI or header) with its constraints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedParam {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub example: Option<Value>,
    pub enum_values: Vec<Value>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub pattern: Option<String>,
    pub default: Option<Value>,
}

impl NamedParam {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            ..Default::default()
        }
    }
}

/// A request or response body declared for one media type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodySpec {
    pub media_type: String,
    pub example: Option<Value>,
    pub schema: Option<Value>,
}

/// One declared response: status code plus its headers and bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub code: u16,
    pub description: Option<String>,
    pub headers: Vec<NamedParam>,
    pub bodies: Vec<BodySpec>,
}

impl ResponseSpec {
    pub fn body(&self, media_type: &str) -> Option<&BodySpec> {
        self.bodies.iter().find(|b| b.media_type == media_type)
    }

    pub fn header(&self, name: &str) -> Option<&NamedParam> {
        self.headers.iter().find(|h| h.name == name)
    }
}

/// A single `(path, method)` pair from the RAML resource tree, carrying
/// everything needed to build a request against it and validate the
/// response.
///
/// `uri_params` holds the parameters of the resource's own path segment
/// and of every ancestor segment, ancestor-first, so example values for
/// the whole template are reachable without a parent pointer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodNode {
    pub path: String,
    pub method: Method,
    pub description: Option<String>,
    pub query_params: Vec<NamedParam>,
    pub uri_params: Vec<NamedParam>,
    pub headers: Vec<NamedParam>,
    pub bodies: Vec<BodySpec>,
    pub responses: Vec<ResponseSpec>,
}

impl MethodNode {
    pub fn body(&self, media_type: &str) -> Option<&BodySpec> {
        self.bodies.iter().find(|b| b.media_type == media_type)
    }

    pub fn response(&self, code: u16) -> Option<&ResponseSpec> {
        self.responses.iter().find(|r| r.code == code)
    }

    pub fn uri_param(&self, name: &str) -> Option<&NamedParam> {
        self.uri_params.iter().find(|p| p.name == name)
    }

    pub fn query_param(&self, name: &str) -> Option<&NamedParam> {
        self.query_params.iter().find(|p| p.name == name)
    }

    pub fn required_query_params(&self) -> impl Iterator<Item = &NamedParam> {
        self.query_params.iter().filter(|p| p.required)
    }
}

/// A parsed RAML document, flattened to one [MethodNode] per declared
/// `(path, method)` pair, in declaration order. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RamlDocument {
    pub title: String,
    pub base_uri: String,
    pub media_type: Option<String>,
    pub nodes: Vec<MethodNode>,
}
