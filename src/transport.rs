// Outbound transport seam
// The replay engine only needs `send(service, request) -> response | error`.
// The default implementation rides on reqwest with redirects disabled so the
// classifier sees 3xx responses instead of their targets.

use crate::errors::TransportError;
use crate::models::HttpService;
use crate::normalizer::ReplayRequest;
use async_trait::async_trait;
use std::time::Duration;

/// Raw response handed back from the wire. `headers` starts with the status
/// line, mirroring the captured-request header convention.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Raw HTTP message: header lines, blank line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut message = self.headers.join("\r\n").into_bytes();
        message.extend_from_slice(b"\r\n\r\n");
        message.extend_from_slice(&self.body);
        message
    }
}

/// Black-box request execution. Timeout policy lives behind this seam, not
/// in the replay engine.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        service: &HttpService,
        request: &ReplayRequest,
    ) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        service: &HttpService,
        request: &ReplayRequest,
    ) -> Result<RawResponse, TransportError> {
        let method: reqwest::Method = request
            .method
            .parse()
            .map_err(|_| TransportError::new(format!("unsupported method: {}", request.method)))?;

        // Captured URLs are normally absolute; fall back to the service
        // descriptor for path-only URLs.
        let url = if request.url.starts_with("http://") || request.url.starts_with("https://") {
            request.url.clone()
        } else {
            format!("{}{}", service, request.url)
        };

        let mut builder = self.client.request(method, &url);
        for line in &request.headers {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            // Skips the request line and anything reqwest manages itself.
            if name.is_empty()
                || name.contains(' ')
                || name.eq_ignore_ascii_case("host")
                || name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            builder = builder.header(name, value.trim());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(TransportError::from)?;
        let status = response.status().as_u16();
        let reason = response.status().canonical_reason().unwrap_or("");
        let mut headers = vec![format!("HTTP/1.1 {} {}", status, reason).trim_end().to_string()];
        for (name, value) in response.headers() {
            headers.push(format!("{}: {}", name, value.to_str().unwrap_or("")));
        }
        let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_response_message_layout() {
        let response = RawResponse {
            status: 200,
            headers: vec!["HTTP/1.1 200 OK".to_string(), "Server: test".to_string()],
            body: b"ok".to_vec(),
        };
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert_eq!(text, "HTTP/1.1 200 OK\r\nServer: test\r\n\r\nok");
    }
}
