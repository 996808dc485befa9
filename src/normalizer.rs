// Request normalization: credential surgery before replay
// A captured request carries the capturing role's identity. Replaying it as
// another role requires stripping every credential carrier and injecting the
// target role's aggregated cookies and headers, never mixing the two.

use crate::models::{CapturedRequest, HttpService};
use crate::roles::Role;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CREDENTIAL_MARKER: Regex =
        Regex::new(r"(?i)(authorization|token|x-auth|bearer)").expect("valid credential regex");
}

/// True for a `Cookie:` header line.
pub fn is_cookie_header(line: &str) -> bool {
    line.to_ascii_lowercase().starts_with("cookie:")
}

/// True for a header line carrying Authorization/Token/X-Auth/Bearer
/// semantics, matched case-insensitively anywhere on the line.
pub fn is_credential_header(line: &str) -> bool {
    CREDENTIAL_MARKER.is_match(line)
}

/// True for any header line that identifies the sender.
pub fn is_credential_carrier(line: &str) -> bool {
    is_cookie_header(line) || is_credential_header(line)
}

/// Value portion of a `Name: value` header line, trimmed.
fn header_value(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, value)| value.trim())
}

/// A fully normalized request ready for the transport.
#[derive(Debug, Clone)]
pub struct ReplayRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
    pub service: HttpService,
}

impl ReplayRequest {
    /// Raw HTTP message: header lines, blank line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut message = self.headers.join("\r\n").into_bytes();
        message.extend_from_slice(b"\r\n\r\n");
        message.extend_from_slice(&self.body);
        message
    }
}

/// Build the request to replay `request` under `target`'s identity.
///
/// Every credential carrier from the capture is dropped, the target role's
/// cookie aggregates collapse into one consolidated `Cookie:` header, and its
/// credential headers are appended verbatim. Method, URL, and body pass
/// through unchanged.
pub fn build_replay_request(request: &CapturedRequest, target: &Role) -> ReplayRequest {
    let mut headers: Vec<String> = request
        .headers
        .iter()
        .filter(|line| !is_credential_carrier(line))
        .cloned()
        .collect();

    let cookie_parts: Vec<&str> = target
        .cookies
        .iter()
        .filter_map(|header| header_value(header))
        .filter(|value| !value.is_empty())
        .collect();
    if !cookie_parts.is_empty() {
        headers.push(format!("Cookie: {}", cookie_parts.join("; ")));
    }

    for header in &target.auth_headers {
        headers.push(header.clone());
    }

    ReplayRequest {
        method: request.method.clone(),
        url: request.url.clone(),
        headers,
        body: request.body.clone(),
        service: request.service.clone(),
    }
}
