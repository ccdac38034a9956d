//! Block implementation for the ledger
//!
//! A block is an ordered batch of transactions chained to its predecessor by
//! hash. Acceptance requires a hash whose leading hex digits are zero.

use crate::core::transaction::Transaction;
use crate::crypto::{meets_difficulty, sha256_hex};
use crate::mining::CancelFlag;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

// =============================================================================
// Block Errors
// =============================================================================

/// Block mining errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlockError {
    #[error("Mining cancelled after {0} attempts")]
    Cancelled(u64),
    #[error("Invalid proof of work for nonce {0}")]
    InvalidProofOfWork(u64),
    #[error("Difficulty {0} exceeds the {} hex digits of a block hash", crate::crypto::MAX_DIFFICULTY)]
    UnreachableDifficulty(usize),
}

/// A block in the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Nonce found by proof of work
    pub nonce: u64,
    /// Transactions in insertion order
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block (`"0"` for genesis)
    pub previous_hash: String,
    /// Block hash (cached, fixed once mined)
    pub hash: String,
}

impl Block {
    /// Create a new block (unmined)
    pub fn new(previous_hash: String, transactions: Vec<Transaction>) -> Self {
        let mut block = Self {
            timestamp: Utc::now().trunc_subsecs(3),
            nonce: 0,
            transactions,
            previous_hash,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create and mine the genesis block
    pub fn genesis(difficulty: usize) -> Self {
        let mut block = Self::new(GENESIS_PREVIOUS_HASH.to_string(), Vec::new());
        block.mine(difficulty);
        block
    }

    /// Serialized transaction list, the same bytes every time for the same content
    fn transactions_payload(&self) -> String {
        serde_json::to_string(&self.transactions).unwrap_or_default()
    }

    fn hash_parts(&self, payload: &str, nonce: u64) -> String {
        let data = format!(
            "{}{}{}{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            nonce,
            payload,
            self.previous_hash
        );
        sha256_hex(data.as_bytes())
    }

    /// Hash over `(timestamp, nonce, transactions, previous_hash)`
    pub fn compute_hash(&self) -> String {
        self.hash_parts(&self.transactions_payload(), self.nonce)
    }

    /// Hasher bound to this block's content, for searching nonces without
    /// re-serializing the transactions on each attempt
    pub fn nonce_hasher(&self) -> impl Fn(u64) -> String + Sync + '_ {
        let payload = self.transactions_payload();
        move |nonce| self.hash_parts(&payload, nonce)
    }

    /// Mine the block (find a valid nonce)
    ///
    /// Starts from the current nonce, so calling it again on a mined block
    /// finds the same nonce immediately. Returns the number of hashes tried.
    /// Never returns for a difficulty above `MAX_DIFFICULTY`; `Ledger` and
    /// `Miner` reject those before searching.
    pub fn mine(&mut self, difficulty: usize) -> u64 {
        let (nonce, hash, attempts) = {
            let hasher = self.nonce_hasher();
            let mut nonce = self.nonce;
            let mut attempts = 0u64;
            loop {
                let hash = hasher(nonce);
                attempts += 1;
                if meets_difficulty(&hash, difficulty) {
                    break (nonce, hash, attempts);
                }
                nonce = nonce.wrapping_add(1);
            }
        };

        self.nonce = nonce;
        self.hash = hash;
        attempts
    }

    /// Mine the block, giving up when `cancel` is triggered
    ///
    /// On cancellation the block is left exactly as it was.
    pub fn mine_cancellable(
        &mut self,
        difficulty: usize,
        cancel: &CancelFlag,
    ) -> Result<u64, BlockError> {
        let (nonce, hash, attempts) = {
            let hasher = self.nonce_hasher();
            let mut nonce = self.nonce;
            let mut attempts = 0u64;
            loop {
                if cancel.is_cancelled() {
                    return Err(BlockError::Cancelled(attempts));
                }
                let hash = hasher(nonce);
                attempts += 1;
                if meets_difficulty(&hash, difficulty) {
                    break (nonce, hash, attempts);
                }
                nonce = nonce.wrapping_add(1);
            }
        };

        self.nonce = nonce;
        self.hash = hash;
        Ok(attempts)
    }

    /// Accept a nonce found elsewhere, after re-hashing and re-checking it
    pub fn apply_nonce(&mut self, nonce: u64, difficulty: usize) -> Result<(), BlockError> {
        let hash = self.hash_parts(&self.transactions_payload(), nonce);
        if !meets_difficulty(&hash, difficulty) {
            return Err(BlockError::InvalidProofOfWork(nonce));
        }
        self.nonce = nonce;
        self.hash = hash;
        Ok(())
    }

    /// Check if the stored hash meets the difficulty target
    pub fn has_valid_pow(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Verify the stored hash against the block content
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// True iff every transaction verifies
    pub fn all_transactions_valid(&self) -> bool {
        self.invalid_transactions().is_empty()
    }

    /// Positions of every transaction that fails verification
    pub fn invalid_transactions(&self) -> Vec<usize> {
        self.transactions
            .iter()
            .enumerate()
            .filter(|(_, tx)| !matches!(tx.verify(), Ok(true)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
