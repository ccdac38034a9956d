//! Mining module: nonce search and cancellation

pub mod cancel;
pub mod miner;

pub use cancel::CancelFlag;
pub use miner::{Miner, MiningStats};
