//! The on-wire response envelope (spec §3).

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source IP and user-agent of the original caller, stamped by the invoking
/// layer (the outer FaaS dispatcher, out of scope here beyond this shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    pub source_ip: String,
    pub user_agent: String,
}

/// A response description sent over the wire by the proxy engine back to a
/// client transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Base64 bytes, empty when the body was offloaded to object storage.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// Set iff the body was offloaded; mutually exclusive with `body`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_details: Option<ClientDetails>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_name: String,
}

impl Response {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Default::default()
        }
    }

    pub fn set_body(&mut self, bytes: &[u8]) {
        self.body = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.signed_url = None;
    }

    pub fn decode_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.body.is_empty() {
            return Ok(Vec::new());
        }
        base64::engine::general_purpose::STANDARD.decode(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// True when the response was offloaded to object storage (spec §8:
    /// streamed responses have a non-empty signed URL and an empty body).
    pub fn is_streamed(&self) -> bool {
        self.signed_url.is_some() && self.body.is_empty()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streamed_and_inline_are_mutually_exclusive() {
        let mut r = Response::new(200);
        r.set_body(b"hello");
        assert!(!r.is_streamed());

        let mut r2 = Response::new(200);
        r2.signed_url = Some("https://bucket/cache/key?sig=abc".to_string());
        assert!(r2.is_streamed());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut r = Response::new(200);
        r.headers.insert("Content-Type".to_string(), "text/plain".to_string());
        assert_eq!(r.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn success_range_is_2xx() {
        assert!(Response::new(200).is_success());
        assert!(Response::new(299).is_success());
        assert!(!Response::new(503).is_success());
        assert!(!Response::new(199).is_success());
    }
}
