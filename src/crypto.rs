//! Proof hashing and random ID/nonce minting.

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

/// 16 random bytes, hex-encoded — used for both channel IDs and server
/// nonces (32 hex chars).
pub fn random_hex_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `hex(SHA-256(server_nonce || client_nonce))`, UTF-8 string concatenation.
pub fn proof_hash(server_nonce: &str, client_nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_nonce.as_bytes());
    hasher.update(client_nonce.as_bytes());
    hex::encode(hasher.finalize())
}

/// Case-insensitive comparison: clients may send the hex digest in either case.
pub fn proof_matches(server_nonce: &str, client_nonce: &str, claimed: &str) -> bool {
    proof_hash(server_nonce, client_nonce).eq_ignore_ascii_case(claimed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_hex_id_is_32_lowercase_hex_chars() {
        let id = random_hex_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn proof_matches_is_case_insensitive() {
        let hash = proof_hash("abc", "def");
        assert!(proof_matches("abc", "def", &hash.to_uppercase()));
        assert!(proof_matches("abc", "def", &hash));
    }

    #[test]
    fn proof_hash_depends_on_both_nonces() {
        assert_ne!(proof_hash("a", "b"), proof_hash("a", "c"));
        assert_ne!(proof_hash("a", "b"), proof_hash("x", "b"));
    }
}
