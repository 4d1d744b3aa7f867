//! Contact-identifier hashing.
//!
//! Raw emails and phone numbers never reach the store; they are normalized
//! and digested here so equal identifiers stay equality-comparable without
//! retaining PII.

use sha2::{Digest, Sha256};

/// Normalize and hash a contact identifier (email or phone).
///
/// Trims whitespace and lowercases before hashing, so "  Ana@X.com " and
/// "ana@x.com" resolve to the same digest. Returns `None` when the input is
/// absent or blank.
pub fn hash_identifier(value: Option<&str>) -> Option<String> {
    let normalized = value?.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    let digest = Sha256::digest(normalized.as_bytes());
    Some(hex::encode(digest))
}
