//! Notebook trust for s3nb.
//!
//! A notebook is trusted when its signature is known to the notary's
//! [`SignatureStore`]. Signatures are keyed BLAKE3 hashes over the notebook's
//! canonical JSON, computed with the signature and per-cell trust flags
//! omitted so that marking cells never changes the signature.
//!
//! On load, every code cell is marked with `metadata.trusted`. On save, the
//! flags are consumed: a notebook whose code cells were all trusted or only
//! carry safe outputs is signed, anything else is left unsigned.

pub mod error;
pub mod notary;
pub mod store;

pub use error::{TrustError, TrustResult};
pub use notary::{NotebookNotary, ALGORITHM};
pub use store::{InMemorySignatureStore, SignatureStore};
