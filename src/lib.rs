//! Pow-Ledger: an append-only ledger secured by proof of work
//!
//! This crate provides:
//! - ECDSA-signed value transfers (secp256k1)
//! - Blocks chained by SHA-256 hash with a leading-zero proof of work
//! - Cancellable, optionally multi-threaded mining
//! - Balance derivation and full-chain tamper detection
//! - JSON persistence and a command-line driver
//!
//! Sender balances are never checked: a transfer of funds the sender does
//! not hold, or of the same funds twice, is accepted as long as it is signed.
//!
//! # Example
//!
//! ```rust
//! use pow_ledger::core::{Ledger, LedgerConfig, Transaction};
//! use pow_ledger::crypto::KeyPair;
//!
//! let mut ledger = Ledger::with_config(LedgerConfig {
//!     difficulty: 2,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let alice = KeyPair::generate();
//! let mut tx = Transaction::new(&alice.public_key_hex(), "bob", 25);
//! tx.sign(&alice).unwrap();
//! ledger.add_transaction(tx).unwrap();
//!
//! ledger.mine_pending_transactions(&alice.public_key_hex()).unwrap();
//! assert_eq!(ledger.get_balance("bob"), 25);
//! assert!(ledger.is_valid().is_ok());
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod storage;

// Re-export commonly used types
pub use crate::core::{
    Block, Ledger, LedgerConfig, SharedLedger, Transaction, ValidationError, DEFAULT_DIFFICULTY,
    DEFAULT_MINING_REWARD,
};
pub use crate::crypto::KeyPair;
pub use crate::mining::{CancelFlag, Miner};
pub use crate::storage::{Storage, StorageConfig};
