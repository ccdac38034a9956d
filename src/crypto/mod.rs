//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the hex proof-of-work predicate
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{abbreviate, meets_difficulty, sha256, sha256_hex, MAX_DIFFICULTY};
pub use keys::{public_key_from_hex, sign_message, verify_signature, KeyError, KeyPair};
