use std::collections::HashSet;
use std::sync::RwLock;

use crate::error::{TrustError, TrustResult};

/// Storage for known notebook signatures.
///
/// A signature is recorded together with the algorithm that produced it so
/// that a key or algorithm change invalidates old entries instead of
/// colliding with them.
pub trait SignatureStore: Send + Sync {
    /// Record a signature as trusted.
    fn store_signature(&self, signature: &str, algorithm: &str) -> TrustResult<()>;

    /// Whether a signature has been recorded.
    fn check_signature(&self, signature: &str, algorithm: &str) -> TrustResult<bool>;

    /// Forget a signature. Returns `true` if it was known.
    fn remove_signature(&self, signature: &str, algorithm: &str) -> TrustResult<bool>;
}

/// Process-local signature store.
///
/// Trust does not survive a restart: notebooks signed by a previous process
/// load as untrusted until they are saved again.
#[derive(Default)]
pub struct InMemorySignatureStore {
    signatures: RwLock<HashSet<(String, String)>>,
}

impl InMemorySignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known signatures.
    pub fn len(&self) -> usize {
        self.signatures.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> TrustError {
    TrustError::Store("lock poisoned".into())
}

impl SignatureStore for InMemorySignatureStore {
    fn store_signature(&self, signature: &str, algorithm: &str) -> TrustResult<()> {
        let mut set = self.signatures.write().map_err(poisoned)?;
        set.insert((algorithm.to_string(), signature.to_string()));
        Ok(())
    }

    fn check_signature(&self, signature: &str, algorithm: &str) -> TrustResult<bool> {
        let set = self.signatures.read().map_err(poisoned)?;
        Ok(set.contains(&(algorithm.to_string(), signature.to_string())))
    }

    fn remove_signature(&self, signature: &str, algorithm: &str) -> TrustResult<bool> {
        let mut set = self.signatures.write().map_err(poisoned)?;
        Ok(set.remove(&(algorithm.to_string(), signature.to_string())))
    }
}

impl std::fmt::Debug for InMemorySignatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySignatureStore")
            .field("signature_count", &self.len())
            .finish()
    }
}
