use async_trait::async_trait;

use crate::error::StoreResult;
use crate::object::{ListRequest, ObjectMeta, ObjectSummary, StoredObject};

/// A flat key-value object store with prefix listing.
///
/// All implementations must satisfy these invariants:
/// - Missing objects read as `Ok(None)` from `get_object` and `head_object`.
/// - `put_object` replaces any existing object (last write wins).
/// - `delete_object` is idempotent.
/// - `copy_object` fails with `StoreError::NotFound` when the source is absent.
/// - Errors are propagated, never retried or swallowed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store addresses.
    fn bucket(&self) -> &str;

    /// Read an object's body and metadata.
    async fn get_object(&self, key: &str) -> StoreResult<Option<StoredObject>>;

    /// Read an object's metadata only.
    async fn head_object(&self, key: &str) -> StoreResult<Option<ObjectMeta>>;

    /// Write an object.
    async fn put_object(&self, key: &str, body: Vec<u8>) -> StoreResult<()>;

    /// Copy an object to a new key within the same bucket.
    async fn copy_object(&self, source: &str, destination: &str) -> StoreResult<()>;

    /// Delete an object.
    async fn delete_object(&self, key: &str) -> StoreResult<()>;

    /// List keys under a prefix. Order is the backend's.
    async fn list_objects(&self, request: &ListRequest) -> StoreResult<Vec<ObjectSummary>>;

    /// Whether an object exists at exactly this key.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.head_object(key).await?.is_some())
    }
}
