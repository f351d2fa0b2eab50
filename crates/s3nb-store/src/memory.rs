use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::object::{ListRequest, ObjectMeta, ObjectSummary, StoredObject};
use crate::traits::ObjectStore;

#[derive(Clone, Debug)]
struct Entry {
    body: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// In-memory, `BTreeMap`-based object store.
///
/// Intended for tests and embedding. Listing follows S3's delimiter rules:
/// keys are visited in lexicographic order and everything below the first
/// delimiter after the prefix collapses into one common-prefix entry.
///
/// Every trait call is counted, and keys can be marked as failing, so tests
/// can assert on round trips and on error propagation.
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, Entry>>,
    failing: RwLock<HashSet<String>>,
    calls: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Create a new empty store for the named bucket.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            failing: RwLock::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().expect("lock poisoned").keys().cloned().collect()
    }

    /// Number of trait calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every operation touching `key` fail with a backend error.
    pub fn inject_failure(&self, key: impl Into<String>) {
        self.failing.write().expect("lock poisoned").insert(key.into());
    }

    /// Undo [`inject_failure`](Self::inject_failure) for every key.
    pub fn clear_failures(&self) {
        self.failing.write().expect("lock poisoned").clear();
    }

    fn enter(&self, operation: &'static str, key: &str) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().expect("lock poisoned").contains(key) {
            return Err(StoreError::backend(operation, key, "injected failure"));
        }
        Ok(())
    }

    fn meta(key: &str, entry: &Entry) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            last_modified: Some(entry.last_modified),
            size: entry.body.len() as u64,
        }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        self.enter("get_object", key)?;
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|entry| StoredObject {
            meta: Self::meta(key, entry),
            body: entry.body.clone(),
        }))
    }

    async fn head_object(&self, key: &str) -> StoreResult<Option<ObjectMeta>> {
        self.enter("head_object", key)?;
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|entry| Self::meta(key, entry)))
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> StoreResult<()> {
        self.enter("put_object", key)?;
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(
            key.to_string(),
            Entry {
                body,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn copy_object(&self, source: &str, destination: &str) -> StoreResult<()> {
        self.enter("copy_object", source)?;
        self.enter("copy_object", destination)?;
        let mut map = self.objects.write().expect("lock poisoned");
        let body = map
            .get(source)
            .map(|entry| entry.body.clone())
            .ok_or_else(|| StoreError::NotFound(source.to_string()))?;
        map.insert(
            destination.to_string(),
            Entry {
                body,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        self.enter("delete_object", key)?;
        self.objects.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn list_objects(&self, request: &ListRequest) -> StoreResult<Vec<ObjectSummary>> {
        self.enter("list_objects", &request.prefix)?;
        let map = self.objects.read().expect("lock poisoned");
        let limit = request.max_keys.unwrap_or(usize::MAX);
        let mut summaries: Vec<ObjectSummary> = Vec::new();

        for (key, entry) in map.range(request.prefix.clone()..) {
            if summaries.len() >= limit {
                break;
            }
            let Some(rest) = key.strip_prefix(&request.prefix) else {
                break;
            };
            let common = request
                .delimiter
                .as_deref()
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|i| &key[..request.prefix.len() + i + d.len()]));
            match common {
                Some(prefix) => {
                    // Keys sharing a common prefix are contiguous in order.
                    if summaries.last().map(|s| s.key.as_str()) != Some(prefix) {
                        summaries.push(ObjectSummary::new(prefix, None));
                    }
                }
                None => summaries.push(ObjectSummary::new(key.clone(), Some(entry.last_modified))),
            }
        }
        Ok(summaries)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("bucket", &self.bucket)
            .field("object_count", &self.len())
            .finish()
    }
}
