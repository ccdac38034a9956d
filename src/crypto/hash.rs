//! Hashing utilities for the ledger
//!
//! SHA-256 is used for transaction fingerprints and block hashes. Block
//! hashes are compared and checked for proof of work in their hex form.

use sha2::{Digest, Sha256};

/// Hex characters in a SHA-256 digest, the highest reachable difficulty
pub const MAX_DIFFICULTY: usize = 64;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Checks if a hex hash meets the difficulty target
/// The first `difficulty` hex characters must all be `'0'`
pub fn meets_difficulty(hash_hex: &str, difficulty: usize) -> bool {
    if hash_hex.len() < difficulty {
        return false;
    }
    hash_hex.bytes().take(difficulty).all(|c| c == b'0')
}

/// First `max_chars` characters of `s`, for display
///
/// Safe on short or non-ASCII input, which a loaded ledger file may contain.
pub fn abbreviate(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(i, _)| &s[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("000fab", 3));
        assert!(meets_difficulty("000fab", 2));
        assert!(!meets_difficulty("000fab", 4));
        assert!(meets_difficulty("abc", 0));
    }

    #[test]
    fn test_meets_difficulty_short_hash() {
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn test_abbreviate() {
        let hash = sha256_hex(b"block");
        assert_eq!(abbreviate(&hash, 16), &hash[..16]);
        assert_eq!(abbreviate("0abc", 16), "0abc");
        assert_eq!(abbreviate("", 16), "");
        assert_eq!(abbreviate("aéééé", 3), "aéé");
    }
}
