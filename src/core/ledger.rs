//! Ledger implementation
//!
//! The ledger owns the chain of blocks and the buffer of transactions waiting
//! for the next mining round. Mining is the only way the chain grows.

use crate::core::block::{Block, BlockError};
use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::MAX_DIFFICULTY;
use crate::mining::{CancelFlag, Miner, MiningStats};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default mining difficulty (number of leading zero hex digits)
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Default mining reward
pub const DEFAULT_MINING_REWARD: u64 = 100;

/// Ledger-related errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Transaction rejected: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Mining failed: {0}")]
    Mining(#[from] BlockError),
    #[error("Ledger has no genesis block")]
    EmptyChain,
    #[error("Difficulty {0} is above the maximum of {}", MAX_DIFFICULTY)]
    InvalidDifficulty(usize),
}

/// Outcome of a failed full-chain validation, naming the offending block
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid transaction in block {0}")]
    InvalidTransactionInBlock(usize),
    #[error("Tampered hash in block {0}")]
    TamperedBlockHash(usize),
    #[error("Previous hash mismatch in block {0}")]
    BrokenChainLink(usize),
    #[error("Insufficient proof of work in block {0}")]
    InsufficientProofOfWork(usize),
}

impl ValidationError {
    /// Index of the block that failed
    pub fn index(&self) -> usize {
        match *self {
            ValidationError::InvalidTransactionInBlock(i)
            | ValidationError::TamperedBlockHash(i)
            | ValidationError::BrokenChainLink(i)
            | ValidationError::InsufficientProofOfWork(i) => i,
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Required leading zero hex digits in every block hash
    pub difficulty: usize,
    /// Amount paid to whoever mines the next block
    pub mining_reward: u64,
    /// Worker threads used for the nonce search
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl LedgerConfig {
    /// Reject a difficulty no SHA-256 hex digest can meet
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty(self.difficulty));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            workers: default_workers(),
        }
    }
}

/// Serialized form of the ledger, checked on the way back in
#[derive(Serialize, Deserialize)]
struct LedgerRecord {
    blocks: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    config: LedgerConfig,
}

impl TryFrom<LedgerRecord> for Ledger {
    type Error = LedgerError;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        if record.blocks.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        record.config.validate()?;
        Ok(Self {
            blocks: record.blocks,
            pending_transactions: record.pending_transactions,
            config: record.config,
        })
    }
}

impl From<Ledger> for LedgerRecord {
    fn from(ledger: Ledger) -> Self {
        Self {
            blocks: ledger.blocks,
            pending_transactions: ledger.pending_transactions,
            config: ledger.config,
        }
    }
}

/// The append-only chain plus its pending transaction buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LedgerRecord", into = "LedgerRecord")]
pub struct Ledger {
    blocks: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    config: LedgerConfig,
}

impl Ledger {
    /// Create a new ledger with a mined genesis block
    pub fn new() -> Self {
        Self::with_genesis(LedgerConfig::default())
    }

    /// Create a ledger with custom configuration
    ///
    /// Fails before mining genesis if the difficulty is unreachable.
    pub fn with_config(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self::with_genesis(config))
    }

    fn with_genesis(config: LedgerConfig) -> Self {
        let genesis = Block::genesis(config.difficulty);
        info!("Genesis block created: {}", genesis.hash);
        Self {
            blocks: vec![genesis],
            pending_transactions: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Change the number of mining threads, which is a local setting and
    /// never part of what the chain commits to
    pub fn set_workers(&mut self, workers: usize) {
        self.config.workers = workers.max(1);
    }

    /// All blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Transactions waiting for the next mining round
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    /// Get the latest block
    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("Ledger should have at least genesis block")
    }

    /// Get a block by index
    pub fn get_block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Ledger height (genesis is 0)
    pub fn height(&self) -> usize {
        self.blocks.len() - 1
    }

    /// Queue a signed transaction for the next block
    ///
    /// Sender balance is not checked, and neither is spending the same funds
    /// twice within the pending buffer.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), TransactionError> {
        match transaction.from_address.as_deref() {
            None | Some("") => {
                return Err(TransactionError::Malformed(
                    "transaction must include a from address".to_string(),
                ))
            }
            Some(_) => {}
        }
        if transaction.to_address.is_empty() {
            return Err(TransactionError::Malformed(
                "transaction must include a to address".to_string(),
            ));
        }

        if !transaction.verify()? {
            warn!(
                "Rejected transaction {} with invalid signature",
                transaction.fingerprint_hex()
            );
            return Err(TransactionError::InvalidSignature);
        }

        debug!(
            "Queued transaction {} ({} -> {})",
            transaction.fingerprint_hex(),
            transaction.amount,
            transaction.to_address
        );
        self.pending_transactions.push(transaction);
        Ok(())
    }

    /// Mine every pending transaction into a new block
    pub fn mine_pending_transactions(
        &mut self,
        reward_address: &str,
    ) -> Result<MiningStats, LedgerError> {
        self.mine_pending_transactions_with(reward_address, &CancelFlag::new())
    }

    /// Mine the pending transactions, giving up when `cancel` is triggered
    ///
    /// Either the mined block is appended and the pending buffer is replaced
    /// by a single reward for `reward_address`, or nothing changes.
    pub fn mine_pending_transactions_with(
        &mut self,
        reward_address: &str,
        cancel: &CancelFlag,
    ) -> Result<MiningStats, LedgerError> {
        if reward_address.is_empty() {
            return Err(TransactionError::Malformed("empty reward address".to_string()).into());
        }

        let mut block = Block::new(
            self.latest_block().hash.clone(),
            self.pending_transactions.clone(),
        );

        let stats = Miner::new(self.config.workers).mine(&mut block, self.config.difficulty, cancel)?;

        info!(
            "Block {} appended with {} transaction(s)",
            self.blocks.len(),
            block.tx_count()
        );
        self.blocks.push(block);
        self.pending_transactions = vec![Transaction::reward(
            reward_address,
            self.config.mining_reward,
        )];

        Ok(stats)
    }

    /// Balance of `address` over every mined transaction
    ///
    /// Signed, since nothing stops an address from spending more than it holds.
    pub fn get_balance(&self, address: &str) -> i128 {
        self.blocks
            .iter()
            .flat_map(|block| &block.transactions)
            .fold(0i128, |balance, tx| {
                let mut balance = balance;
                if tx.from_address.as_deref() == Some(address) {
                    balance -= i128::from(tx.amount);
                }
                if tx.to_address == address {
                    balance += i128::from(tx.amount);
                }
                balance
            })
    }

    /// Get all mined transactions sent from or to an address
    pub fn get_transactions_for_address(&self, address: &str) -> Vec<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|block| &block.transactions)
            .filter(|tx| tx.from_address.as_deref() == Some(address) || tx.to_address == address)
            .collect()
    }

    /// Validate the entire chain, reporting the first failure
    ///
    /// Genesis is not re-checked. For every later block the checks run in
    /// order: transactions, stored hash, link to the previous block, proof of work.
    pub fn is_valid(&self) -> Result<(), ValidationError> {
        let result = self.check_blocks();
        if let Err(e) = &result {
            warn!("Chain validation failed: {}", e);
        }
        result
    }

    fn check_blocks(&self) -> Result<(), ValidationError> {
        for i in 1..self.blocks.len() {
            let current = &self.blocks[i];
            let previous = &self.blocks[i - 1];

            if !current.all_transactions_valid() {
                return Err(ValidationError::InvalidTransactionInBlock(i));
            }

            if !current.verify_hash() {
                return Err(ValidationError::TamperedBlockHash(i));
            }

            if current.previous_hash != previous.hash {
                return Err(ValidationError::BrokenChainLink(i));
            }

            if !current.has_valid_pow(self.config.difficulty) {
                return Err(ValidationError::InsufficientProofOfWork(i));
            }
        }

        Ok(())
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.height(),
            total_blocks: self.blocks.len(),
            total_transactions: self.blocks.iter().map(Block::tx_count).sum(),
            pending_transactions: self.pending_transactions.len(),
            difficulty: self.config.difficulty,
            mining_reward: self.config.mining_reward,
            latest_hash: self.latest_block().hash.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Chain statistics
#[derive(Debug, Clone)]
pub struct ChainStats {
    pub height: usize,
    pub total_blocks: usize,
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub difficulty: usize,
    pub mining_reward: u64,
    pub latest_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    const REWARD: u64 = 100;

    fn test_ledger() -> Ledger {
        Ledger::with_config(LedgerConfig {
            difficulty: 2,
            mining_reward: REWARD,
            workers: 1,
        })
        .unwrap()
    }

    fn transfer(from: &KeyPair, to: &str, amount: u64) -> Transaction {
        let mut tx = Transaction::new(&from.public_key_hex(), to, amount);
        tx.sign(from).unwrap();
        tx
    }

    #[test]
    fn test_new_ledger() {
        let ledger = test_ledger();
        assert_eq!(ledger.blocks().len(), 1);
        assert_eq!(ledger.height(), 0);
        assert_eq!(ledger.latest_block().previous_hash, "0");
        assert!(ledger.pending_transactions().is_empty());
        assert!(ledger.is_valid().is_ok());
    }

    #[test]
    fn test_add_transaction() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();

        ledger.add_transaction(transfer(&alice, "bob", 10)).unwrap();
        assert_eq!(ledger.pending_transactions().len(), 1);
    }

    #[test]
    fn test_add_reward_transaction_is_malformed() {
        let mut ledger = test_ledger();
        let result = ledger.add_transaction(Transaction::reward("bob", 10));
        assert!(matches!(result, Err(TransactionError::Malformed(_))));
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_transaction_without_recipient() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        let tx = transfer(&alice, "", 10);
        assert!(matches!(
            ledger.add_transaction(tx),
            Err(TransactionError::Malformed(_))
        ));
    }

    #[test]
    fn test_add_unsigned_transaction() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        let tx = Transaction::new(&alice.public_key_hex(), "bob", 10);
        assert!(matches!(
            ledger.add_transaction(tx),
            Err(TransactionError::MissingSignature)
        ));
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_forged_transaction() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        let mut tx = transfer(&alice, "bob", 10);
        tx.amount = 10_000;
        assert!(matches!(
            ledger.add_transaction(tx),
            Err(TransactionError::InvalidSignature)
        ));
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_no_double_spend_check() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();

        // Alice has nothing, yet both are accepted
        ledger.add_transaction(transfer(&alice, "bob", 50)).unwrap();
        ledger.add_transaction(transfer(&alice, "carol", 50)).unwrap();
        ledger.mine_pending_transactions("miner").unwrap();

        assert_eq!(ledger.get_balance(&alice.public_key_hex()), -100);
    }

    #[test]
    fn test_mine_pending_transactions() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        let tx = transfer(&alice, "bob", 25);
        ledger.add_transaction(tx.clone()).unwrap();

        let stats = ledger.mine_pending_transactions("miner").unwrap();

        assert_eq!(ledger.blocks().len(), 2);
        let block = ledger.latest_block();
        assert_eq!(block.nonce, stats.nonce);
        assert_eq!(block.transactions, vec![tx]);
        assert_eq!(block.previous_hash, ledger.blocks()[0].hash);
        assert!(block.has_valid_pow(2));
        assert_eq!(
            ledger.pending_transactions(),
            &[Transaction::reward("miner", REWARD)]
        );
    }

    #[test]
    fn test_cancelled_mining_changes_nothing() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        ledger.add_transaction(transfer(&alice, "bob", 25)).unwrap();
        let pending = ledger.pending_transactions().to_vec();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = ledger.mine_pending_transactions_with("miner", &cancel);

        assert!(matches!(
            result,
            Err(LedgerError::Mining(BlockError::Cancelled(_)))
        ));
        assert_eq!(ledger.blocks().len(), 1);
        assert_eq!(ledger.pending_transactions(), pending.as_slice());
    }

    #[test]
    fn test_mine_with_empty_reward_address() {
        let mut ledger = test_ledger();
        assert!(ledger.mine_pending_transactions("").is_err());
        assert_eq!(ledger.blocks().len(), 1);
    }

    #[test]
    fn test_balances() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        let a = alice.public_key_hex();

        ledger.add_transaction(transfer(&alice, "bob", 25)).unwrap();
        ledger.mine_pending_transactions(&a).unwrap();

        assert_eq!(ledger.get_balance("bob"), 25);
        assert_eq!(ledger.get_balance(&a), -25);

        // The reward for the first round lands with the second block
        ledger.mine_pending_transactions(&a).unwrap();
        assert_eq!(ledger.get_balance(&a), REWARD as i128 - 25);
        assert_eq!(ledger.get_balance("nobody"), 0);
        assert_eq!(ledger.get_transactions_for_address(&a).len(), 2);
        assert!(ledger.is_valid().is_ok());
    }

    #[test]
    fn test_self_transfer_nets_zero() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        let a = alice.public_key_hex();
        ledger.add_transaction(transfer(&alice, &a, 40)).unwrap();
        ledger.mine_pending_transactions("miner").unwrap();
        assert_eq!(ledger.get_balance(&a), 0);
    }

    #[test]
    fn test_tampered_signed_amount() {
        let mut ledger = test_ledger();
        let alice = KeyPair::generate();
        ledger.add_transaction(transfer(&alice, "bob", 25)).unwrap();
        ledger.mine_pending_transactions("miner").unwrap();

        ledger.block_mut(1).unwrap().transactions[0].amount = 2_500;

        assert_eq!(
            ledger.is_valid(),
            Err(ValidationError::InvalidTransactionInBlock(1))
        );
    }

    #[test]
    fn test_tampered_reward_amount() {
        let mut ledger = test_ledger();
        ledger.mine_pending_transactions("miner").unwrap();
        ledger.mine_pending_transactions("miner").unwrap();

        // Block 2 carries the reward from round one
        ledger.block_mut(2).unwrap().transactions[0].amount = 1_000_000;

        assert_eq!(ledger.is_valid(), Err(ValidationError::TamperedBlockHash(2)));
    }

    #[test]
    fn test_broken_chain_link() {
        let mut ledger = test_ledger();
        for _ in 0..3 {
            ledger.mine_pending_transactions("miner").unwrap();
        }

        // Re-link block 2 and redo its proof of work so only the link is wrong
        let block = ledger.block_mut(2).unwrap();
        block.previous_hash = "f".repeat(64);
        block.mine(2);

        assert_eq!(ledger.is_valid(), Err(ValidationError::BrokenChainLink(2)));
    }

    #[test]
    fn test_insufficient_proof_of_work() {
        let mut ledger = test_ledger();
        ledger.mine_pending_transactions("miner").unwrap();

        // Find a nonce that keeps the hash consistent but misses the target
        let block = ledger.block_mut(1).unwrap();
        let (nonce, hash) = {
            let hasher = block.nonce_hasher();
            let nonce = (0..).find(|n| !hasher(*n).starts_with("00")).unwrap();
            (nonce, hasher(nonce))
        };
        block.nonce = nonce;
        block.hash = hash;

        assert_eq!(
            ledger.is_valid(),
            Err(ValidationError::InsufficientProofOfWork(1))
        );
    }

    #[test]
    fn test_first_failure_is_reported() {
        let mut ledger = test_ledger();
        ledger.mine_pending_transactions("miner").unwrap();
        ledger.mine_pending_transactions("miner").unwrap();

        ledger.block_mut(2).unwrap().hash = "0".repeat(64);
        ledger.block_mut(1).unwrap().nonce += 1;

        let err = ledger.is_valid().unwrap_err();
        assert_eq!(err, ValidationError::TamperedBlockHash(1));
        assert_eq!(err.index(), 1);
    }

    #[test]
    fn test_genesis_is_not_checked() {
        let mut ledger = test_ledger();
        ledger.block_mut(0).unwrap().nonce += 1;
        assert!(ledger.is_valid().is_ok());
    }

    #[test]
    fn test_serde_roundtrip_rejects_empty_chain() {
        let ledger = test_ledger();
        let json = serde_json::to_string(&ledger).unwrap();
        let loaded: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.blocks(), ledger.blocks());

        let empty = r#"{"blocks":[],"pending_transactions":[],"config":{"difficulty":2,"mining_reward":1}}"#;
        assert!(serde_json::from_str::<Ledger>(empty).is_err());
    }

    #[test]
    fn test_unreachable_difficulty_rejected() {
        let config = LedgerConfig {
            difficulty: MAX_DIFFICULTY + 1,
            ..Default::default()
        };
        assert!(matches!(
            Ledger::with_config(config),
            Err(LedgerError::InvalidDifficulty(65))
        ));

        let json = r#"{"blocks":[{"timestamp":"2024-01-01T00:00:00Z","nonce":0,"transactions":[],"previous_hash":"0","hash":""}],"pending_transactions":[],"config":{"difficulty":65,"mining_reward":1}}"#;
        assert!(serde_json::from_str::<Ledger>(json).is_err());
    }

    #[test]
    fn test_set_workers() {
        let mut ledger = test_ledger();
        ledger.set_workers(4);
        assert_eq!(ledger.config().workers, 4);
        ledger.set_workers(0);
        assert_eq!(ledger.config().workers, 1);

        ledger.set_workers(3);
        ledger.mine_pending_transactions("miner").unwrap();
        assert!(ledger.is_valid().is_ok());
    }

    #[test]
    fn test_stats() {
        let mut ledger = test_ledger();
        ledger.mine_pending_transactions("miner").unwrap();
        let stats = ledger.stats();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_transactions, 0);
        assert_eq!(stats.pending_transactions, 1);
        assert_eq!(stats.latest_hash, ledger.latest_block().hash);
    }
}
