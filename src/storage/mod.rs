//! Object storage abstraction (spec §3 "Storage contract").
//!
//! The proxy engine treats cached bodies as opaque blobs addressed by the
//! key computed in [`crate::cachekey`]. Any backend — S3, GCS, the
//! in-process [`memory::MemoryStorage`] used by the demo binary and tests —
//! implements this trait.

pub mod memory;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::model::ObjectInfo;

/// A body delivered as it arrives rather than pre-buffered; chunk errors are
/// surfaced as plain I/O errors so backends don't need to know about hyper.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Errors a `Storage` backend can surface. Mirrors the closed set of error
/// codes a real object store reports, collapsed to three buckets the engine
/// actually branches on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("storage error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes `body` under `key`, recording `content_type` and `metadata`
    /// (the engine always stamps a `timestamp` entry, see
    /// [`crate::model::ObjectInfo::cached_at`]).
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError>;

    /// Writes `body` under `key` as it arrives instead of requiring the
    /// whole object in memory ahead of time. `content_length` is the
    /// advertised size, or `-1` when unknown (spec §6 "streaming with
    /// unknown size"); the authoritative length is read back via `head`
    /// once the upload completes.
    async fn put_stream(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        content_length: i64,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError>;

    /// Reads the full object back. `Ok(None)` is a cache miss; any other
    /// error is a storage failure the caller should treat as a pass-through
    /// fetch rather than a fatal error.
    async fn get(&self, key: &str) -> Result<Option<(Bytes, ObjectInfo)>, StorageError>;

    /// Checks existence and fetches metadata without the body. `Ok(None)`
    /// is a miss.
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError>;

    /// Produces a time-limited URL a client can fetch the object from
    /// directly, bypassing the proxy for large/streamed bodies.
    async fn sign_url(&self, key: &str, expires: Duration) -> Result<String, StorageError>;
}
