//! Call key derivation.
//!
//! A call key is the SHA-256 digest of the canonical encoding of a call's
//! arguments (see `canonical.rs`). The encoding keeps type shape, so `()`,
//! `None` and `Some(None)` never share a key, and floats are keyed by their
//! bits. Maps and hash sets are keyed independently of iteration order;
//! other sequences keep their order.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::canonical;

/// Arguments could not be serialized into a call key.
#[derive(Debug, Error)]
#[error("arguments are not serializable: {0}")]
pub struct KeyError(String);

impl KeyError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Deterministic identifier for one invocation's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey(String);

impl CallKey {
    /// Derive the key for `args`.
    ///
    /// Fails only when the argument's `Serialize` impl reports an error.
    pub fn derive<A: Serialize + ?Sized>(args: &A) -> Result<Self, KeyError> {
        let encoded = canonical::encode(args)?;
        let mut hasher = Sha256::new();
        hasher.update((encoded.len() as u64).to_le_bytes());
        hasher.update(&encoded);
        Ok(Self(hex::encode(hasher.finalize().as_slice())))
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
