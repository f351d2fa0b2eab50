use s3nb_types::{Cell, Notebook};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{TrustError, TrustResult};
use crate::store::{InMemorySignatureStore, SignatureStore};

/// Algorithm tag recorded with every signature.
pub const ALGORITHM: &str = "blake3";

/// Domain tag mixed into every signature.
const DOMAIN: &str = "s3nb-notebook-v1";

/// Output types that can carry active content.
const UNSAFE_OUTPUT_TYPES: &[&str] = &["execute_result", "display_data"];

/// Keys (top-level and mimebundle) that are safe to render untrusted.
const SAFE_OUTPUT_KEYS: &[&str] = &[
    "output_type",
    "execution_count",
    "metadata",
    "text/plain",
    "image/png",
    "image/jpeg",
];

/// Signs notebooks and decides which cells may be trusted.
pub struct NotebookNotary {
    key: [u8; 32],
    store: Box<dyn SignatureStore>,
}

impl NotebookNotary {
    pub fn new(key: [u8; 32], store: impl SignatureStore + 'static) -> Self {
        Self {
            key,
            store: Box::new(store),
        }
    }

    /// A notary with a fresh random key and an in-memory store.
    pub fn with_random_key() -> Self {
        Self::new(rand::random(), InMemorySignatureStore::new())
    }

    /// A notary keyed from 64 hex characters, with an in-memory store.
    pub fn from_hex_key(hex_key: &str) -> TrustResult<Self> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| TrustError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            TrustError::InvalidKey(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::new(key, InMemorySignatureStore::new()))
    }

    /// Keyed hash of the notebook, ignoring the stored signature and any
    /// per-cell trust flags.
    pub fn compute_signature(&self, nb: &Notebook) -> TrustResult<String> {
        let mut stripped = nb.clone();
        stripped.metadata.remove("signature");
        for cell in &mut stripped.cells {
            cell.metadata_mut().remove("trusted");
        }
        let bytes = stripped.canonical_bytes()?;

        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize().as_bytes()))
    }

    /// Whether the notebook's current signature is known.
    pub fn check_signature(&self, nb: &Notebook) -> TrustResult<bool> {
        let signature = self.compute_signature(nb)?;
        self.store.check_signature(&signature, ALGORITHM)
    }

    /// Record the notebook's signature as trusted.
    pub fn sign(&self, nb: &Notebook) -> TrustResult<()> {
        let signature = self.compute_signature(nb)?;
        debug!(signature = %&signature[..12], "signing notebook");
        self.store.store_signature(&signature, ALGORITHM)
    }

    /// Forget the notebook's signature.
    pub fn unsign(&self, nb: &Notebook) -> TrustResult<()> {
        let signature = self.compute_signature(nb)?;
        self.store.remove_signature(&signature, ALGORITHM)?;
        Ok(())
    }

    /// Set `metadata.trusted` on every code cell.
    pub fn mark_cells(&self, nb: &mut Notebook, trusted: bool) {
        for cell in &mut nb.cells {
            if let Cell::Code(code) = cell {
                code.metadata.insert("trusted".into(), Value::Bool(trusted));
            }
        }
    }

    /// Consume the trust flags and report whether every code cell is safe.
    ///
    /// Every cell is visited so that no flag survives into storage.
    pub fn check_cells(&self, nb: &mut Notebook) -> bool {
        let mut trusted = true;
        for cell in &mut nb.cells {
            if let Cell::Code(code) = cell {
                let flagged = matches!(code.metadata.remove("trusted"), Some(Value::Bool(true)));
                if !flagged && !code.outputs.iter().all(output_is_safe) {
                    trusted = false;
                }
            }
        }
        trusted
    }

    /// Mark cells according to the stored signature. Returns the verdict.
    pub fn mark_trusted_cells(&self, nb: &mut Notebook, path: &str) -> TrustResult<bool> {
        let trusted = self.check_signature(nb)?;
        if !trusted {
            warn!(path, "notebook is not trusted");
        }
        self.mark_cells(nb, trusted);
        Ok(trusted)
    }

    /// Sign the notebook if all of its cells are safe. Returns whether it
    /// was signed.
    pub fn check_and_sign(&self, nb: &mut Notebook, path: &str) -> TrustResult<bool> {
        if self.check_cells(nb) {
            self.sign(nb)?;
            Ok(true)
        } else {
            warn!(path, "notebook is not trusted, not signing");
            Ok(false)
        }
    }
}

fn output_is_safe(output: &Value) -> bool {
    let output_type = output.get("output_type").and_then(Value::as_str).unwrap_or_default();
    if !UNSAFE_OUTPUT_TYPES.contains(&output_type) {
        return true;
    }
    let Some(fields) = output.as_object() else {
        return false;
    };
    let data_keys = fields
        .get("data")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|data| data.keys());
    fields
        .keys()
        .filter(|key| key.as_str() != "data")
        .chain(data_keys)
        .all(|key| SAFE_OUTPUT_KEYS.contains(&key.as_str()))
}

impl std::fmt::Debug for NotebookNotary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookNotary")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}
