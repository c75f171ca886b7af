//! The closed proxy error taxonomy shared by the engine, transport and
//! dispatcher, plus its stable wire encoding.

use serde::{Deserialize, Serialize};

use crate::model::Response;

/// A proxy-side failure, closed over the six kinds the wire protocol knows
/// about. Every other error surfaced by this crate is wrapped into one of
/// these before crossing a component boundary.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("proxy error [{}] {message}", kind.code())]
pub struct ProxyError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ProxyErrorKind,
    /// The last retryable response seen before cancellation, when this error
    /// is a cancellation raised mid-backoff (spec §4.3 "DoneWithLastResp").
    /// Not part of the wire envelope; only observed in-process.
    #[serde(skip)]
    pub last_response: Option<Box<Response>>,
}

/// The closed set of proxy error kinds, each carrying a stable numeric code
/// on the wire (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProxyErrorKind {
    /// Unclassified proxy-side failure.
    Unknown = 0,
    /// Missing/invalid URL, undecodable body, unbuildable request.
    BadRequest = 1,
    /// Inline path saw more bytes than the inline limit allows.
    ExceededMaxBodySize = 2,
    /// Content-type gate rejected the upstream response.
    DisallowedContentType = 3,
    /// Ambient deadline elapsed or the network call timed out.
    Timeout = 4,
    /// Cache read/write/sign failure.
    Storage = 5,
}

impl ProxyErrorKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::BadRequest,
            2 => Self::ExceededMaxBodySize,
            3 => Self::DisallowedContentType,
            4 => Self::Timeout,
            5 => Self::Storage,
            _ => Self::Unknown,
        }
    }
}

impl Serialize for ProxyErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ProxyErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

impl ProxyError {
    pub fn new(kind: ProxyErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            last_response: None,
        }
    }

    /// Attaches the last seen response to a cancellation error (spec §4.3
    /// "DoneWithLastResp" / §5 "Cancellation").
    pub fn with_last_response(mut self, resp: Response) -> Self {
        self.last_response = Some(Box::new(resp));
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::BadRequest, message)
    }

    pub fn exceeded_max_body_size(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::ExceededMaxBodySize, message)
    }

    pub fn disallowed_content_type(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::DisallowedContentType, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::Timeout, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::Storage, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ProxyErrorKind::Unknown, message)
    }

    /// Maps this error to its outer HTTP status code per spec §4.5/§7:
    /// `BadRequest` maps to 400, every other kind maps to 500.
    pub fn outer_status_code(&self) -> u16 {
        match self.kind {
            ProxyErrorKind::BadRequest => 400,
            _ => 500,
        }
    }
}
