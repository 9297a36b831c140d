//! Storage family: bucket object get, put, delete, and list

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::S3Object;
use crate::effect::Effect;
use crate::error::{Error, StorageFault};
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::reply::Reply;

/// Result of an object fetch. Absence is an expected state, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectFetch {
    /// The bucket held an object at the key
    Found(S3Object),
    /// The bucket held nothing at the key
    Absent,
}

/// Backend object store the embedder supplies for storage effects.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Fetch an object
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectFetch, StorageFault>;

    /// Store an object, overwriting any existing content; returns the
    /// backend's version id when versioning is enabled
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        metadata: &BTreeMap<String, String>,
        content_type: Option<&str>,
    ) -> Result<Option<String>, StorageFault>;

    /// Delete an object.
    ///
    /// Must be idempotent: deleting a missing key succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageFault>;

    /// List keys under an optional prefix. The port chooses the order and may
    /// return fewer than `max_keys`; fewer means the final page.
    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        max_keys: u32,
    ) -> Result<Vec<String>, StorageFault>;
}

/// Specialized handler for the storage family.
pub struct StorageHandler<P> {
    port: P,
}

impl<P> StorageHandler<P> {
    const DISPATCHER_NAME: &'static str = "StorageHandler";

    /// Wrap a store port
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<P: StoragePort> HandlerContract for StorageHandler<P> {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        match effect {
            Effect::GetObject { ref bucket, ref key } => {
                let fetched = self.port.get(bucket, key).await;
                match fetched {
                    Ok(ObjectFetch::Found(object)) => Outcome::Ok(Reply::S3Object(object)),
                    Ok(ObjectFetch::Absent) => Outcome::Ok(Reply::ObjectAbsent),
                    Err(fault) => {
                        tracing::warn!(
                            kind = %fault.kind,
                            retryable = fault.is_retryable(),
                            "object fetch failed: {}", fault.message
                        );
                        Outcome::Err(Error::Storage { effect, fault })
                    }
                }
            }
            Effect::PutObject {
                ref bucket,
                ref key,
                ref content,
                ref metadata,
                ref content_type,
            } => {
                let stored = self
                    .port
                    .put(bucket, key, content, metadata, content_type.as_deref())
                    .await;
                match stored {
                    Ok(version_id) => Outcome::Ok(Reply::PutSuccess {
                        key: key.clone(),
                        bucket: bucket.clone(),
                        version_id,
                    }),
                    Err(fault) => {
                        tracing::warn!(
                            kind = %fault.kind,
                            retryable = fault.is_retryable(),
                            "object write failed: {}", fault.message
                        );
                        Outcome::Err(Error::Storage { effect, fault })
                    }
                }
            }
            Effect::DeleteObject { ref bucket, ref key } => {
                let deleted = self.port.delete(bucket, key).await;
                match deleted {
                    Ok(()) => Outcome::Ok(Reply::Unit),
                    Err(fault) => Outcome::Err(Error::Storage { effect, fault }),
                }
            }
            Effect::ListObjects {
                ref bucket,
                ref prefix,
                max_keys,
            } => {
                let listed = self.port.list(bucket, prefix.as_deref(), max_keys).await;
                match listed {
                    Ok(mut keys) => {
                        // The page size cap binds even when the port over-delivers.
                        keys.truncate(max_keys as usize);
                        Outcome::Ok(Reply::KeyList { keys })
                    }
                    Err(fault) => Outcome::Err(Error::Storage { effect, fault }),
                }
            }
            other => Outcome::Err(Error::Unhandled {
                effect: other,
                dispatcher_name: Self::DISPATCHER_NAME,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::error::StorageFaultKind;

    /// Port over a plain in-process map of (bucket, key) to content.
    struct MapStore {
        objects: Mutex<HashMap<(String, String), S3Object>>,
        fail_with: Option<StorageFault>,
    }

    impl MapStore {
        fn empty() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                fail_with: None,
            }
        }

        fn failing(fault: StorageFault) -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                fail_with: Some(fault),
            }
        }
    }

    #[async_trait]
    impl StoragePort for MapStore {
        async fn get(&self, bucket: &str, key: &str) -> Result<ObjectFetch, StorageFault> {
            if let Some(fault) = &self.fail_with {
                return Err(fault.clone());
            }
            let objects = self.objects.lock().unwrap();
            match objects.get(&(bucket.to_string(), key.to_string())) {
                Some(object) => Ok(ObjectFetch::Found(object.clone())),
                None => Ok(ObjectFetch::Absent),
            }
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            content: &[u8],
            metadata: &BTreeMap<String, String>,
            content_type: Option<&str>,
        ) -> Result<Option<String>, StorageFault> {
            if let Some(fault) = &self.fail_with {
                return Err(fault.clone());
            }
            let object = S3Object {
                key: key.to_string(),
                content: content.to_vec(),
                metadata: metadata.clone(),
                content_type: content_type.map(String::from),
                last_modified: Utc::now(),
                size: content.len() as u64,
            };
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), object);
            Ok(None)
        }

        async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageFault> {
            if let Some(fault) = &self.fail_with {
                return Err(fault.clone());
            }
            self.objects
                .lock()
                .unwrap()
                .remove(&(bucket.to_string(), key.to_string()));
            Ok(())
        }

        async fn list(
            &self,
            bucket: &str,
            prefix: Option<&str>,
            _max_keys: u32,
        ) -> Result<Vec<String>, StorageFault> {
            if let Some(fault) = &self.fail_with {
                return Err(fault.clone());
            }
            let objects = self.objects.lock().unwrap();
            let mut keys: Vec<String> = objects
                .keys()
                .filter(|(b, k)| b == bucket && prefix.map_or(true, |p| k.starts_with(p)))
                .map(|(_, k)| k.clone())
                .collect();
            keys.sort();
            Ok(keys)
        }
    }

    fn put_effect(key: &str, content: &[u8]) -> Effect {
        Effect::PutObject {
            bucket: "media".to_string(),
            key: key.to_string(),
            content: content.to_vec(),
            metadata: BTreeMap::new(),
            content_type: Some("text/plain".to_string()),
        }
    }

    #[tokio::test]
    async fn test_absent_object_is_a_reply_not_an_error() {
        let handler = StorageHandler::new(MapStore::empty());
        let result = handler
            .handle(Effect::GetObject {
                bucket: "media".to_string(),
                key: "missing".to_string(),
            })
            .await;
        assert_eq!(result, Outcome::Ok(Reply::ObjectAbsent));
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let handler = StorageHandler::new(MapStore::empty());
        let result = handler.handle(put_effect("a.txt", b"alpha")).await;
        assert!(matches!(
            result,
            Outcome::Ok(Reply::PutSuccess { ref key, ref bucket, .. })
                if key == "a.txt" && bucket == "media"
        ));

        let result = handler
            .handle(Effect::GetObject {
                bucket: "media".to_string(),
                key: "a.txt".to_string(),
            })
            .await;
        let Outcome::Ok(Reply::S3Object(object)) = result else {
            panic!("expected the stored object");
        };
        assert_eq!(object.content, b"alpha");
        assert_eq!(object.size, 5);
    }

    #[tokio::test]
    async fn test_overwrite_is_allowed() {
        let handler = StorageHandler::new(MapStore::empty());
        handler.handle(put_effect("a.txt", b"old")).await.unwrap_ok();
        handler.handle(put_effect("a.txt", b"new")).await.unwrap_ok();

        let result = handler
            .handle(Effect::GetObject {
                bucket: "media".to_string(),
                key: "a.txt".to_string(),
            })
            .await;
        let Outcome::Ok(Reply::S3Object(object)) = result else {
            panic!("expected the stored object");
        };
        assert_eq!(object.content, b"new");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let handler = StorageHandler::new(MapStore::empty());
        handler.handle(put_effect("a.txt", b"alpha")).await.unwrap_ok();

        let delete = Effect::DeleteObject {
            bucket: "media".to_string(),
            key: "a.txt".to_string(),
        };
        for _ in 0..2 {
            let result = handler.handle(delete.clone()).await;
            assert_eq!(result, Outcome::Ok(Reply::Unit));
        }
    }

    #[tokio::test]
    async fn test_list_truncates_to_max_keys() {
        let handler = StorageHandler::new(MapStore::empty());
        for name in ["a", "b", "c", "d"] {
            handler
                .handle(put_effect(&format!("logs/{name}"), b"x"))
                .await
                .unwrap_ok();
        }

        let result = handler
            .handle(Effect::ListObjects {
                bucket: "media".to_string(),
                prefix: Some("logs/".to_string()),
                max_keys: 2,
            })
            .await;
        let Outcome::Ok(Reply::KeyList { keys }) = result else {
            panic!("expected a key list");
        };
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn test_permission_failure_is_permanent() {
        let handler = StorageHandler::new(MapStore::failing(StorageFault::permission_denied(
            "access denied for bucket media",
        )));
        let result = handler
            .handle(Effect::GetObject {
                bucket: "media".to_string(),
                key: "a.txt".to_string(),
            })
            .await;
        let error = result.unwrap_err();
        assert!(!error.is_retryable());
        assert!(matches!(
            error,
            Error::Storage { ref fault, .. }
                if fault.kind == StorageFaultKind::PermissionDenied
        ));
    }

    #[tokio::test]
    async fn test_quota_failure_is_retryable() {
        let handler = StorageHandler::new(MapStore::failing(StorageFault::new(
            StorageFaultKind::QuotaExceeded,
            "rate exceeded",
        )));
        let result = handler.handle(put_effect("a.txt", b"x")).await;
        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_foreign_effect_is_unhandled() {
        let handler = StorageHandler::new(MapStore::empty());
        let result = handler.handle(Effect::ReceiveText).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::Unhandled {
                dispatcher_name: "StorageHandler",
                ..
            }
        ));
    }
}
