//! Canonical serialization for the dataset hash.
//!
//! The same inputs and config must produce the same output table byte for
//! byte, and the hash is the cheap way to check that across runs.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap allowed: hashed data uses BTreeMap throughout

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::{MethodConfig, Unit};

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical serialization failed")
}

/// SHA-256 over the canonical bytes, hex encoded.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    let bytes = to_canonical_bytes(value);
    hex::encode(Sha256::digest(&bytes))
}

/// Hash the final unit table together with the config that produced it.
///
/// The config is part of the digest so the same data analyzed under a
/// different method yields a different hash.
pub fn dataset_hash(units: &[Unit], config: &MethodConfig) -> String {
    #[derive(Serialize)]
    struct Digestible<'a> {
        config: &'a MethodConfig,
        units: &'a [Unit],
    }
    canonical_hash_hex(&Digestible { config, units })
}
