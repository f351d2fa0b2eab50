//! Object storage for s3nb.
//!
//! The adapter never talks to a storage service directly; it is written
//! against the [`ObjectStore`] trait, a flat key space with prefix and
//! delimiter listing.
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- ordered map for tests and embedding
//! - [`S3ObjectStore`] -- Amazon S3 or any S3-compatible service
//!
//! # Rules
//!
//! 1. Reading a missing object is `Ok(None)`, never an error.
//! 2. Every other failure is propagated as-is; nothing is retried.
//! 3. Listing with a delimiter reports each common prefix once, as a key
//!    ending in the delimiter.

pub mod error;
pub mod memory;
pub mod object;
pub mod s3;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{ListRequest, ObjectMeta, ObjectSummary, StoredObject};
pub use s3::{S3ObjectStore, S3Options};
pub use traits::ObjectStore;
