//! In-process `Storage` reference implementation, backed by a sharded
//! concurrent map. Used by the demo binary and exercised directly in
//! integration tests; not meant to survive a process restart.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures::StreamExt;

use crate::model::ObjectInfo;

use super::{ByteStream, Storage, StorageError};

struct Stored {
    body: Bytes,
    info: ObjectInfo,
}

pub struct MemoryStorage {
    objects: DashMap<String, Stored>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: DashMap::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("https://cache.invalid")
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let mut info = ObjectInfo::new(content_type, body.len() as i64);
        info.last_modified = SystemTime::now();
        info.metadata = metadata;
        self.objects.insert(key.to_string(), Stored { body, info });
        Ok(())
    }

    /// The in-process map has no true streaming sink, so this backend
    /// drains `body` into a single buffer itself; a real object-store
    /// backend (S3 multipart, GCS resumable upload) would instead forward
    /// each chunk to the wire without this intermediate copy.
    async fn put_stream(
        &self,
        key: &str,
        mut body: ByteStream,
        content_type: &str,
        _content_length: i64,
        metadata: HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StorageError::Internal(format!("stream read failed: {e}")))?;
            buf.extend_from_slice(&chunk);
        }
        self.put(key, buf.freeze(), content_type, metadata).await
    }

    async fn get(&self, key: &str) -> Result<Option<(Bytes, ObjectInfo)>, StorageError> {
        Ok(self
            .objects
            .get(key)
            .map(|entry| (entry.body.clone(), entry.info.clone())))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        Ok(self.objects.get(key).map(|entry| entry.info.clone()))
    }

    async fn sign_url(&self, key: &str, expires: Duration) -> Result<String, StorageError> {
        if !self.objects.contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let expires_at = SystemTime::now()
            .checked_add(expires)
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(format!("{}/{key}?expires={expires_at}", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_stream_assembles_chunks_in_order() {
        let store = MemoryStorage::default();
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ];
        let stream = futures::stream::iter(chunks).boxed();
        store
            .put_stream("cache/h/k", stream, "text/plain", -1, HashMap::new())
            .await
            .unwrap();

        let (body, _) = store.get("cache/h/k").await.unwrap().unwrap();
        assert_eq!(body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn put_then_get_round_trips_body_and_content_type() {
        let store = MemoryStorage::default();
        store
            .put("cache/h/k", Bytes::from_static(b"hello"), "text/plain", HashMap::new())
            .await
            .unwrap();

        let (body, info) = store.get("cache/h/k").await.unwrap().unwrap();
        assert_eq!(body, Bytes::from_static(b"hello"));
        assert_eq!(info.content_type, "text/plain");
        assert!(info.exists);
    }

    #[tokio::test]
    async fn get_on_missing_key_is_none_not_error() {
        let store = MemoryStorage::default();
        assert!(store.get("cache/h/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn head_reports_metadata_without_body() {
        let store = MemoryStorage::default();
        let mut meta = HashMap::new();
        meta.insert("timestamp".to_string(), "2026-01-01T00:00:00Z".to_string());
        store
            .put("cache/h/k", Bytes::from_static(b"body"), "application/json", meta)
            .await
            .unwrap();

        let info = store.head("cache/h/k").await.unwrap().unwrap();
        assert_eq!(info.content_length, 4);
        assert!(info.cached_at().is_some());
    }

    #[tokio::test]
    async fn sign_url_fails_for_missing_key() {
        let store = MemoryStorage::default();
        let err = store.sign_url("cache/h/missing", Duration::from_secs(60)).await;
        assert!(matches!(err, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn sign_url_succeeds_for_existing_key() {
        let store = MemoryStorage::default();
        store
            .put("cache/h/k", Bytes::from_static(b"body"), "text/plain", HashMap::new())
            .await
            .unwrap();
        let url = store.sign_url("cache/h/k", Duration::from_secs(900)).await.unwrap();
        assert!(url.contains("cache/h/k"));
    }
}
