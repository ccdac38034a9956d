//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (signed transfers and mining rewards)
//! - Blocks (with proof of work)
//! - Ledger (append, balances, full-chain validation)
//! - A lock-protected ledger handle for concurrent callers

pub mod block;
pub mod ledger;
pub mod shared;
pub mod transaction;

pub use block::{Block, BlockError, GENESIS_PREVIOUS_HASH};
pub use ledger::{
    ChainStats, Ledger, LedgerConfig, LedgerError, ValidationError, DEFAULT_DIFFICULTY,
    DEFAULT_MINING_REWARD,
};
pub use shared::SharedLedger;
pub use transaction::{Transaction, TransactionError};
