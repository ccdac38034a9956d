//! Mining engine for the ledger
//!
//! Searches for a proof-of-work nonce, optionally across several worker
//! threads that race over interleaved nonce ranges.

use crate::core::{Block, BlockError};
use crate::crypto::{abbreviate, meets_difficulty, MAX_DIFFICULTY};
use crate::mining::CancelFlag;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Nonce that was committed
    pub nonce: u64,
    /// Number of hash attempts (summed over all workers)
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(nonce: u64, hash_attempts: u64, start: Instant) -> Self {
        let time_ms = start.elapsed().as_millis();
        let hash_rate = if time_ms > 0 {
            (hash_attempts as f64) / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };
        Self {
            nonce,
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// Nonce searcher
#[derive(Debug, Clone)]
pub struct Miner {
    /// Number of worker threads (at least one)
    pub workers: usize,
}

impl Miner {
    /// Create a new miner
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Mine `block` at `difficulty`, stopping early if `cancel` is triggered
    ///
    /// The block is only modified when a nonce is found and re-checked.
    pub fn mine(
        &self,
        block: &mut Block,
        difficulty: usize,
        cancel: &CancelFlag,
    ) -> Result<MiningStats, BlockError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockError::UnreachableDifficulty(difficulty));
        }
        let start = Instant::now();

        info!(
            "Mining block on {} with difficulty {} ({} worker(s))...",
            abbreviate(&block.previous_hash, 16),
            difficulty,
            self.workers
        );

        let attempts = if self.workers == 1 {
            block.mine_cancellable(difficulty, cancel)?
        } else {
            let (nonce, attempts) = self.search_parallel(block, difficulty, cancel)?;
            block.apply_nonce(nonce, difficulty)?;
            attempts
        };

        let stats = MiningStats::new(block.nonce, attempts, start);

        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            abbreviate(&block.hash, 16),
            stats.time_ms,
            stats.hash_attempts,
            stats.hash_rate
        );

        Ok(stats)
    }

    /// Race the workers over interleaved nonces and return the lowest found
    fn search_parallel(
        &self,
        block: &Block,
        difficulty: usize,
        cancel: &CancelFlag,
    ) -> Result<(u64, u64), BlockError> {
        let workers = self.workers as u64;
        let start_nonce = block.nonce;
        let hasher = block.nonce_hasher();
        let found = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);

        let winner = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let hasher = &hasher;
                    let found = &found;
                    let attempts = &attempts;
                    s.spawn(move || {
                        let mut nonce = start_nonce.wrapping_add(worker);
                        let mut tried = 0u64;
                        let result = loop {
                            if found.load(Ordering::Relaxed) || cancel.is_cancelled() {
                                break None;
                            }
                            let hash = hasher(nonce);
                            tried += 1;
                            if meets_difficulty(&hash, difficulty) {
                                found.store(true, Ordering::SeqCst);
                                break Some(nonce);
                            }
                            nonce = nonce.wrapping_add(workers);
                        };
                        attempts.fetch_add(tried, Ordering::Relaxed);
                        debug!("Worker {} stopped after {} attempts", worker, tried);
                        result
                    })
                })
                .collect();

            handles
                .into_iter()
                .filter_map(|handle| handle.join().ok().flatten())
                .min()
        });

        let attempts = attempts.load(Ordering::SeqCst);
        match winner {
            Some(nonce) => Ok((nonce, attempts)),
            None => Err(BlockError::Cancelled(attempts)),
        }
    }
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(1)
    }
}
