//! Response validation against the RAML contract.
//!
//! Each checkpoint yields a three-state [Check]: an undeclared status
//! code is the one hard contract breach; a missing schema or missing
//! header declarations are skips, since absence of a contract is not a
//! violation of it.

use itertools::Itertools;

use crate::http::HttpResponse;
use crate::raml::MethodNode;
use crate::report::Check;

pub use headers::{check_header, coerce};

mod headers;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Validates `response` against the contract node for its method/path.
/// `node` is `None` when the method was never declared; that is a skip
/// (reported upstream as a suite warning), not a failure.
pub fn validate(node: Option<&MethodNode>, response: &HttpResponse) -> Vec<Check> {
    let Some(node) = node else {
        return vec![Check::skip(
            "contract",
            "method not declared in RAML, nothing to validate against",
        )];
    };

    let Some(declared) = node.response(response.status) else {
        return vec![Check::fail(
            "status",
            format!(
                "undeclared status code {} for {} {}",
                response.status, node.method, node.path
            ),
        )];
    };

    let mut checks = vec![Check::pass("status")];
    checks.push(check_body(declared, response));
    checks.extend(check_headers(declared, response));
    checks
}

fn check_body(
    declared: &crate::raml::ResponseSpec,
    response: &HttpResponse,
) -> Check {
    let schema = declared
        .body(JSON_MEDIA_TYPE)
        .and_then(|body| body.schema.as_ref());
    let Some(schema) = schema else {
        return Check::skip("body", "no body schema declared");
    };

    let payload = match response.json() {
        Ok(payload) => payload,
        Err(err) => {
            return Check::fail("body", format!("response body is not valid JSON: {}", err))
        }
    };

    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(err) => return Check::fail("body", format!("invalid body schema: {}", err)),
    };
    let errors = validator
        .iter_errors(&payload)
        .map(|err| err.to_string())
        .collect_vec();
    if errors.is_empty() {
        Check::pass("body")
    } else {
        Check::fail("body", errors.join("; "))
    }
}

fn check_headers(
    declared: &crate::raml::ResponseSpec,
    response: &HttpResponse,
) -> Vec<Check> {
    if declared.headers.is_empty() {
        return vec![Check::skip("headers", "no headers declared")];
    }
    declared
        .headers
        .iter()
        .map(|param| check_header(param, response.header(&param.name)))
        .collect()
}
