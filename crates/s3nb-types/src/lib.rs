//! Foundation types for s3nb.
//!
//! This crate defines the document model exchanged with the host editing
//! application and the notebook format the adapter reads and writes.
//!
//! # Key Types
//!
//! - [`Contents`] -- typed document model, one variant per [`ContentKind`]
//! - [`ContentsModel`] -- the loosely-typed wire shape seen by the host
//! - [`SavePayload`] -- a validated save request decoded from the wire shape
//! - [`Notebook`] -- nbformat v4 document with ordered [`Cell`]s

pub mod error;
pub mod kind;
pub mod model;
pub mod notebook;

pub use error::{TypeError, TypeResult};
pub use kind::{ContentFormat, ContentKind, FileFormat};
pub use model::{
    Contents, ContentsModel, DirectoryModel, Entry, FileContent, FileModel, NotebookModel,
    SavePayload,
};
pub use notebook::{Cell, CodeCell, Notebook, TextCell};
