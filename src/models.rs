// Core data models for AuthMatrix

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheme of the destination service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    /// Parse a scheme string; anything that is not plain "http" is treated as https.
    pub fn from_scheme(scheme: &str) -> Self {
        if scheme.eq_ignore_ascii_case("http") {
            Protocol::Http
        } else {
            Protocol::Https
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Destination service a request is sent to: host, port, and scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpService {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl HttpService {
    pub fn new(host: &str, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.to_string(),
            port,
            protocol,
        }
    }
}

impl Default for HttpService {
    fn default() -> Self {
        Self::new("localhost", 443, Protocol::Https)
    }
}

impl fmt::Display for HttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// One inbound request as delivered by the traffic interception layer.
#[derive(Debug, Clone)]
pub struct ObservedRequest {
    pub method: String,
    pub url: String,
    /// Header lines as seen on the wire, request line included.
    pub headers: Vec<String>,
    pub body: Vec<u8>,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

/// A deduplicated request stored for one role. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    /// Full header list as captured, credentials included.
    pub headers: Vec<String>,
    /// Cookie headers extracted from `headers`.
    pub cookies: Vec<String>,
    /// Credential headers (Authorization/Token/X-Auth/Bearer style) extracted from `headers`.
    pub auth_headers: Vec<String>,
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
    pub service: HttpService,
}

/// Classification of one replay outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Vulnerable,
    Safe,
    Suspicious,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Vulnerable => write!(f, "VULNERABLE"),
            Verdict::Safe => write!(f, "SAFE"),
            Verdict::Suspicious => write!(f, "SUSPICIOUS"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VULNERABLE" => Ok(Verdict::Vulnerable),
            "SAFE" => Ok(Verdict::Safe),
            "SUSPICIOUS" => Ok(Verdict::Suspicious),
            "ERROR" => Ok(Verdict::Error),
            other => Err(format!("unknown verdict: {}", other)),
        }
    }
}

/// One replay of a baseline request under another role's credentials.
/// Created by the replay engine, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub endpoint: String,
    pub method: String,
    /// Role whose credentials were substituted in.
    pub role: String,
    /// Observed status code, 0 when the transport failed.
    pub status: u16,
    pub verdict: Verdict,
    pub details: String,
    /// Raw replayed request, kept only when full-message storage is on.
    pub request_bytes: Option<Vec<u8>>,
    /// Raw response, kept only when full-message storage is on.
    pub response_bytes: Option<Vec<u8>>,
    pub service: HttpService,
}

/// Serde helper: raw bytes as standard base64 strings inside JSON documents.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
