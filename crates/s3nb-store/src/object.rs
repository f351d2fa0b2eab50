use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a single stored object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// An object body with its metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub meta: ObjectMeta,
    pub body: Vec<u8>,
}

/// One entry of a listing: an object, or a common prefix (which has no
/// timestamp and whose key ends in the delimiter).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            last_modified,
        }
    }
}

/// Parameters of a prefix listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    /// Group keys below the first delimiter after the prefix.
    /// `None` lists every descendant.
    pub delimiter: Option<String>,
    /// Stop after this many entries.
    pub max_keys: Option<usize>,
}

impl ListRequest {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}
