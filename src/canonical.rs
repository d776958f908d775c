//! Canonical hashing for deterministic identifiers.
//!
//! Two hash families are used in this crate:
//!
//! - **SHA-256 (hex)** for anything that is persisted or compared across runs:
//!   atom ids, atom content hashes and quote-verification hashes.
//! - **xxHash64 over canonical JSON** for in-process fingerprints: policy
//!   parameter hashes and verification cache keys.
//!
//! ## Determinism Guarantees
//!
//! - Same `(message_id, sequence_index)` → same atom id, on every run
//! - Stable field order: structs serialize in declaration order
//! - No HashMap allowed in hashed data: use BTreeMap

use serde::Serialize;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// SHA-256 of raw bytes as a 64-character lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Deterministic atom identifier.
///
/// ```text
/// atom_id = SHA256(message_id ‖ "_" ‖ sequence_index)
/// ```
///
/// # Example
///
/// ```rust
/// use thread_forensics::canonical::atom_id;
///
/// assert_eq!(atom_id("msg_001", 0), atom_id("msg_001", 0));
/// assert_ne!(atom_id("msg_001", 0), atom_id("msg_001", 1));
/// ```
pub fn atom_id(message_id: &str, sequence_index: usize) -> String {
    sha256_hex(format!("{}_{}", message_id, sequence_index).as_bytes())
}

/// Content hash stored on each atom: `SHA256(lowercase(trim(content)))`.
///
/// Interior whitespace is preserved here; quote verification uses the
/// stricter [`crate::verification::normalize`] instead.
pub fn content_hash(content: &str) -> String {
    sha256_hex(content.trim().to_lowercase().as_bytes())
}

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Falls back to an empty buffer if the value cannot be represented as JSON
/// (only possible for maps with non-string keys).
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}
