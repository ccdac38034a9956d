//! Transaction handling for the ledger
//!
//! A transaction moves `amount` from one public-key address to another and
//! carries an ECDSA signature over its fingerprint. Reward transactions have
//! no sender and are trusted by construction.

use crate::crypto::{public_key_from_hex, sha256, verify_signature, KeyError, KeyPair};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Malformed transaction: {0}")]
    Malformed(String),
    #[error("Cannot sign a transaction you do not own")]
    Unauthorized,
    #[error("No signature in this transaction")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Transaction
// =============================================================================

/// The economically meaningful fields, in the order they are fingerprinted
#[derive(Serialize)]
struct SigningPayload<'a> {
    from_address: Option<&'a str>,
    to_address: &'a str,
    amount: u64,
}

/// A signed transfer of value between two addresses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Sender's public key (hex); `None` for mining rewards
    pub from_address: Option<String>,
    /// Recipient's public key (hex)
    pub to_address: String,
    /// Amount transferred
    pub amount: u64,
    /// Hex-encoded compact ECDSA signature over the fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    /// Create a new (unsigned) transfer
    pub fn new(from_address: &str, to_address: &str, amount: u64) -> Self {
        Self {
            from_address: Some(from_address.to_string()),
            to_address: to_address.to_string(),
            amount,
            signature: None,
        }
    }

    /// Create a mining reward transaction
    pub fn reward(to_address: &str, amount: u64) -> Self {
        Self {
            from_address: None,
            to_address: to_address.to_string(),
            amount,
            signature: None,
        }
    }

    /// Whether this is a mining reward (no sender)
    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Deterministic SHA-256 digest over `(from_address, to_address, amount)`
    pub fn fingerprint(&self) -> Vec<u8> {
        let payload = SigningPayload {
            from_address: self.from_address.as_deref(),
            to_address: &self.to_address,
            amount: self.amount,
        };
        sha256(&serde_json::to_vec(&payload).unwrap_or_default())
    }

    /// Fingerprint as a hex string
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }

    /// Sign the transaction with the sender's key pair
    ///
    /// The key pair's public key must equal `from_address`. On failure the
    /// signature is left untouched.
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        let public_key_hex = key_pair.public_key_hex();
        if self.from_address.as_deref() != Some(public_key_hex.as_str()) {
            return Err(TransactionError::Unauthorized);
        }

        let signature = key_pair.sign(&self.fingerprint())?;
        self.signature = Some(hex::encode(signature));
        Ok(())
    }

    /// Verify the signature against `from_address`
    ///
    /// Rewards always verify. A sender-bearing transaction without a
    /// signature is an error; one whose signature or sender key does not
    /// decode simply fails verification.
    pub fn verify(&self) -> Result<bool, TransactionError> {
        let from_address = match &self.from_address {
            None => return Ok(true),
            Some(address) => address,
        };

        let signature_hex = match self.signature.as_deref() {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        let public_key = match public_key_from_hex(from_address) {
            Ok(key) => key,
            Err(e) => {
                debug!("Sender address is not a public key: {}", e);
                return Ok(false);
            }
        };

        let signature = match hex::decode(signature_hex) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        match verify_signature(&public_key, &self.fingerprint(), &signature) {
            Ok(valid) => Ok(valid),
            Err(KeyError::InvalidSignature) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
