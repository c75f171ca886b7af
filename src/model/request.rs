//! The on-wire request envelope (spec §3).

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ProxyError;

/// A request description sent over the wire between a client transport and
/// the proxy engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Base64-encoded body bytes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cookies: String,
    #[serde(default)]
    pub timeout: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_content_types: Vec<String>,
    #[serde(default)]
    pub head: bool,
    #[serde(default)]
    pub cache_max_age: f64,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Returns the effective method, defaulting to GET when empty (spec §3).
    pub fn effective_method(&self) -> &str {
        if self.method.is_empty() {
            "GET"
        } else {
            &self.method
        }
    }

    /// Sets the body from raw bytes, base64-encoding it for the wire.
    pub fn set_body(&mut self, bytes: &[u8]) {
        self.body = base64::engine::general_purpose::STANDARD.encode(bytes);
    }

    /// Decodes the base64 body into raw bytes. A malformed body is a
    /// `BadRequest` error per spec §4.1.
    pub fn decode_body(&self) -> Result<Vec<u8>, ProxyError> {
        if self.body.is_empty() {
            return Ok(Vec::new());
        }
        base64::engine::general_purpose::STANDARD
            .decode(&self.body)
            .map_err(|e| ProxyError::bad_request(format!("failed to decode request body: {e}")))
    }

    /// `cacheMaxAge` as a `Duration`, or `None` when caching is bypassed
    /// (`cacheMaxAge <= 0`).
    pub fn cache_max_age_duration(&self) -> Option<std::time::Duration> {
        if self.cache_max_age > 0.0 {
            Some(std::time::Duration::from_secs_f64(self.cache_max_age))
        } else {
            None
        }
    }

    /// `timeout` as a `Duration`, or `None` when no proxy-imposed deadline
    /// applies (`timeout <= 0`).
    pub fn timeout_duration(&self) -> Option<std::time::Duration> {
        if self.timeout > 0.0 {
            Some(std::time::Duration::from_secs_f64(self.timeout))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_method_to_get() {
        let req = Request::new("https://example.com");
        assert_eq!(req.effective_method(), "GET");
    }

    #[test]
    fn preserves_explicit_method() {
        let mut req = Request::new("https://example.com");
        req.method = "POST".to_string();
        assert_eq!(req.effective_method(), "POST");
    }

    #[test]
    fn round_trips_body_bytes() {
        let mut req = Request::new("https://example.com");
        req.set_body(b"hello");
        assert_eq!(req.decode_body().unwrap(), b"hello");
    }

    #[test]
    fn rejects_malformed_base64_body() {
        let mut req = Request::new("https://example.com");
        req.body = "not-valid-base64!!".to_string();
        let err = req.decode_body().unwrap_err();
        assert_eq!(err.kind.code(), 1);
    }

    #[test]
    fn zero_cache_max_age_bypasses_cache() {
        let req = Request::new("https://example.com");
        assert!(req.cache_max_age_duration().is_none());
    }

    #[test]
    fn serializes_with_camel_case_field_names() {
        let mut req = Request::new("https://example.com");
        req.cache_max_age = 60.0;
        req.allowed_content_types = vec!["application/json".to_string()];
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["cacheMaxAge"], 60.0);
        assert_eq!(json["allowedContentTypes"][0], "application/json");
    }

    #[test]
    fn round_trip_preserves_identity() {
        let mut req = Request::new("https://example.com/path?q=1");
        req.method = "POST".to_string();
        req.headers.insert("X-Test".to_string(), "value".to_string());
        req.set_body(b"payload bytes");
        req.cookies = "session=abc".to_string();
        req.timeout = 2.5;
        req.allowed_content_types = vec!["text/*".to_string()];
        req.head = true;
        req.cache_max_age = 30.0;

        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: Request = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.decode_body().unwrap(), b"payload bytes");
    }
}
