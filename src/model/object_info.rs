//! Metadata describing a stored blob, returned by `Storage::head`/`get`
//! (spec §3 "ObjectInfo").

use std::collections::HashMap;
use std::time::SystemTime;

/// Metadata of a stored blob. Invariant: on a successful head/get, `exists`
/// is always `true` — a miss is represented as `Ok(None)` by the store, not
/// as an `ObjectInfo` with `exists = false` (see `storage::Storage::head`).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub content_type: String,
    pub content_length: i64,
    pub last_modified: SystemTime,
    pub etag: String,
    pub checksum: String,
    pub exists: bool,
    pub metadata: HashMap<String, String>,
}

impl ObjectInfo {
    pub fn new(content_type: impl Into<String>, content_length: i64) -> Self {
        Self {
            content_type: content_type.into(),
            content_length,
            last_modified: SystemTime::now(),
            etag: String::new(),
            checksum: String::new(),
            exists: true,
            metadata: HashMap::new(),
        }
    }

    /// Looks up the `timestamp` metadata field and parses it as an RFC 3339
    /// UTC instant. Per spec §3, a missing or unparseable timestamp means
    /// the object is treated as a cache miss, never deleted implicitly.
    pub fn cached_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.metadata
            .get("timestamp")
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}
