//! Thread-safe handle to a ledger
//!
//! Every mutation holds the write lock for its whole duration, including the
//! nonce search, so callers never observe a half-applied mining round.

use crate::core::ledger::{Ledger, LedgerError, ValidationError};
use crate::core::transaction::{Transaction, TransactionError};
use crate::mining::{CancelFlag, MiningStats};
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable, lock-protected ledger
#[derive(Clone, Default)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn add_transaction(&self, transaction: Transaction) -> Result<(), TransactionError> {
        self.inner.write().add_transaction(transaction)
    }

    pub fn mine_pending_transactions(
        &self,
        reward_address: &str,
        cancel: &CancelFlag,
    ) -> Result<MiningStats, LedgerError> {
        self.inner
            .write()
            .mine_pending_transactions_with(reward_address, cancel)
    }

    pub fn get_balance(&self, address: &str) -> i128 {
        self.inner.read().get_balance(address)
    }

    pub fn is_valid(&self) -> Result<(), ValidationError> {
        self.inner.read().is_valid()
    }

    /// Run `f` against a consistent view of the ledger
    pub fn read<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        f(&self.inner.read())
    }

    /// Owned copy for long-running inspection without holding the lock
    pub fn snapshot(&self) -> Ledger {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LedgerConfig;
    use crate::crypto::KeyPair;
    use std::thread;

    #[test]
    fn test_concurrent_submissions() {
        let shared = SharedLedger::new(Ledger::with_config(LedgerConfig {
            difficulty: 1,
            mining_reward: 10,
            workers: 1,
        })
        .unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    let kp = KeyPair::generate();
                    for amount in 1..=5 {
                        let mut tx = Transaction::new(&kp.public_key_hex(), "sink", amount);
                        tx.sign(&kp).unwrap();
                        shared.add_transaction(tx).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.read(|l| l.pending_transactions().len()), 20);

        shared
            .mine_pending_transactions("miner", &CancelFlag::new())
            .unwrap();

        assert_eq!(shared.get_balance("sink"), 4 * 15);
        assert!(shared.is_valid().is_ok());

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.blocks().len(), 2);
    }
}
