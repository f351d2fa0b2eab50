//! Notebook contents served from object storage.
//!
//! A notebook host reads and writes notebooks, files and directories
//! through the [`ContentsManager`] trait. [`S3ContentsManager`] implements
//! it over any [`ObjectStore`](s3nb_store::ObjectStore): virtual paths map
//! to keys under a configured prefix, and directories are emulated with a
//! key delimiter.

pub mod config;
pub mod error;
pub mod hooks;
pub mod keys;
pub mod manager;
pub mod s3;

pub use config::{BucketConfig, ContentsConfig, UntitledNames, S3_SCHEME};
pub use error::{ContentsError, ContentsResult};
pub use hooks::{NoOpHook, PreSaveHook};
pub use keys::KeyMapper;
pub use manager::{CheckpointsKind, ContentsManager, GetOptions};
pub use s3::S3ContentsManager;
