//! CLI commands for the ledger
//!
//! Implements all command handlers for the CLI interface.

use crate::core::{Ledger, LedgerConfig, Transaction};
use crate::crypto::{abbreviate, KeyPair};
use crate::storage::{Storage, StorageConfig};
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub ledger: Ledger,
    pub storage: Storage,
}

impl AppState {
    /// Load the ledger from `data_dir`, creating one if none exists
    ///
    /// Difficulty and reward only shape a new ledger; `config.workers`
    /// applies to a loaded one too.
    pub fn new(data_dir: PathBuf, config: LedgerConfig) -> CliResult<Self> {
        let storage = Storage::new(StorageConfig {
            data_dir,
            ..Default::default()
        })?;

        let ledger = if storage.exists() {
            println!("📂 Loading existing ledger...");
            let mut ledger = storage.load()?;
            ledger.set_workers(config.workers);
            ledger
        } else {
            println!("🆕 Creating new ledger...");
            let ledger = Ledger::with_config(config)?;
            storage.save(&ledger)?;
            ledger
        };

        Ok(Self { ledger, storage })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.ledger)?;
        Ok(())
    }
}

/// Generate and print a key pair
pub fn cmd_keygen() -> CliResult<()> {
    let key_pair = KeyPair::generate();

    println!("🔐 New key pair");
    println!("   📍 Public key (address): {}", key_pair.public_key_hex());
    println!("   🔑 Private key: {}", key_pair.private_key_hex());
    println!("\n   ⚠️  Keep the private key secret; it signs transfers from this address.");

    Ok(())
}

/// Initialize a new ledger
pub fn cmd_init(data_dir: &Path, config: LedgerConfig) -> CliResult<()> {
    let storage = Storage::new(StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    })?;

    if storage.exists() {
        println!("⚠️  Ledger already exists at {:?}", data_dir);
        return Ok(());
    }

    let ledger = Ledger::with_config(config)?;
    storage.save(&ledger)?;

    println!("✅ Ledger initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🔧 Difficulty: {}", ledger.config().difficulty);
    println!("   🎁 Mining reward: {}", ledger.config().mining_reward);
    println!("   🧱 Genesis block hash: {}", ledger.latest_block().hash);

    Ok(())
}

/// Sign a transfer with `private_key` and queue it
pub fn cmd_send(state: &mut AppState, private_key: &str, to: &str, amount: u64) -> CliResult<()> {
    let key_pair = KeyPair::from_private_key_hex(private_key)?;
    let from = key_pair.public_key_hex();

    let mut tx = Transaction::new(&from, to, amount);
    tx.sign(&key_pair)?;

    println!("📤 Transaction created:");
    println!("   Fingerprint: {}", tx.fingerprint_hex());
    println!("   From: {}", from);
    println!("   To: {}", to);
    println!("   Amount: {}", amount);

    state.ledger.add_transaction(tx)?;
    state.save()?;

    println!("\n✅ Transaction added to pending transactions");
    println!("   It will be included in the next mined block.");

    Ok(())
}

/// Mine pending transactions into new blocks
pub fn cmd_mine(state: &mut AppState, address: &str, count: u32) -> CliResult<()> {
    println!("⛏️  Mining {} block(s) for address: {}", count, address);
    println!("   Difficulty: {}", state.ledger.config().difficulty);

    for _ in 0..count {
        let tx_count = state.ledger.pending_transactions().len();
        let stats = state.ledger.mine_pending_transactions(address)?;
        let block = state.ledger.latest_block();

        println!("\n   Block {} mined!", state.ledger.height());
        println!("   ├─ Hash: {}", abbreviate(&block.hash, 16));
        println!("   ├─ Transactions: {}", tx_count);
        println!("   ├─ Nonce: {}", stats.nonce);
        println!("   ├─ Time: {}ms", stats.time_ms);
        println!("   ├─ Attempts: {}", stats.hash_attempts);
        println!("   └─ Hash rate: {:.2} H/s", stats.hash_rate);

        // Save after each block
        state.save()?;
    }

    let balance = state.ledger.get_balance(address);
    println!("\n💰 Balance for miner: {}", balance);
    println!("   The reward for the last block is paid out in the next one.");

    Ok(())
}

/// Show the balance of an address
pub fn cmd_balance(state: &AppState, address: &str) -> CliResult<()> {
    let balance = state.ledger.get_balance(address);
    let history = state.ledger.get_transactions_for_address(address);

    println!("💰 Balance for {}", address);
    println!("   Total: {}", balance);
    println!("   Transactions: {}", history.len());

    for tx in history.iter().take(10) {
        let direction = if tx.to_address == address { "+" } else { "-" };
        println!(
            "   └─ {}{} ({})",
            direction,
            tx.amount,
            abbreviate(&tx.fingerprint_hex(), 16)
        );
    }
    if history.len() > 10 {
        println!("   ... and {} more", history.len() - 10);
    }

    Ok(())
}

/// Display ledger info and recent blocks
pub fn cmd_chain(state: &AppState, count: usize) -> CliResult<()> {
    let stats = state.ledger.stats();

    println!("⛓️  Ledger Info");
    println!("   ├─ Height: {}", stats.height);
    println!("   ├─ Total blocks: {}", stats.total_blocks);
    println!("   ├─ Total transactions: {}", stats.total_transactions);
    println!("   ├─ Pending transactions: {}", stats.pending_transactions);
    println!("   ├─ Difficulty: {}", stats.difficulty);
    println!("   ├─ Mining reward: {}", stats.mining_reward);
    println!("   └─ Latest hash: {}", stats.latest_hash);

    let height = stats.height;
    let start = (height + 1).saturating_sub(count);

    println!("\n🧱 Recent blocks:");
    for i in (start..=height).rev() {
        if let Some(block) = state.ledger.get_block(i) {
            println!(
                "   #{} | {} | nonce {} | {} tx | {}",
                i,
                abbreviate(&block.hash, 16),
                block.nonce,
                block.tx_count(),
                block.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}

/// Show pending transactions
pub fn cmd_pending(state: &AppState) -> CliResult<()> {
    let pending = state.ledger.pending_transactions();

    println!("📬 Pending transactions: {}", pending.len());
    for tx in pending {
        let from = tx.from_address.as_deref().unwrap_or("<reward>");
        println!(
            "   └─ {} -> {} : {}",
            abbreviate(from, 16),
            abbreviate(&tx.to_address, 16),
            tx.amount
        );
    }

    Ok(())
}

/// Validate the ledger, failing if any block does not verify
pub fn cmd_validate(state: &AppState) -> CliResult<()> {
    println!("🔍 Validating ledger...");

    match state.ledger.is_valid() {
        Ok(()) => {
            println!("✅ Ledger is valid!");
            println!("   {} blocks verified", state.ledger.blocks().len());
            Ok(())
        }
        Err(e) => {
            println!("❌ Ledger validation FAILED!");
            Err(e.into())
        }
    }
}

/// Export ledger to file
pub fn cmd_export(state: &AppState, path: &Path) -> CliResult<()> {
    crate::storage::save_to_file(&state.ledger, path)?;
    println!("📦 Ledger exported to {:?}", path);
    Ok(())
}

/// Import ledger from file
pub fn cmd_import(state: &mut AppState, path: &Path) -> CliResult<()> {
    let mut ledger = crate::storage::load_from_file(path)?;

    if let Err(e) = ledger.is_valid() {
        println!("❌ Imported ledger is invalid");
        return Err(e.into());
    }
    ledger.set_workers(state.ledger.config().workers);

    state.ledger = ledger;
    state.save()?;

    println!("📥 Ledger imported from {:?}", path);
    println!("   Height: {}", state.ledger.height());

    Ok(())
}

/// Run the end-to-end walkthrough in memory
pub fn cmd_demo(config: LedgerConfig) -> CliResult<()> {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let (a, b) = (alice.public_key_hex(), bob.public_key_hex());

    println!("🆕 Creating ledger (difficulty {})...", config.difficulty);
    let mut ledger = Ledger::with_config(config)?;
    println!("   Blocks: {}", ledger.blocks().len());

    let mut tx = Transaction::new(&a, &b, 25);
    tx.sign(&alice)?;
    ledger.add_transaction(tx)?;
    println!("\n📤 Alice sends 25 to Bob");

    ledger.mine_pending_transactions(&a)?;
    println!("⛏️  Mined block 1; blocks: {}", ledger.blocks().len());
    println!("   Bob: {}  Alice: {}", ledger.get_balance(&b), ledger.get_balance(&a));

    ledger.mine_pending_transactions(&a)?;
    println!("⛏️  Mined block 2 (pays Alice's reward)");
    println!("   Bob: {}  Alice: {}", ledger.get_balance(&b), ledger.get_balance(&a));
    println!("   Valid: {:?}", ledger.is_valid());

    // Tamper through the serialized form, the way an edited ledger file would
    let mut value = serde_json::to_value(&ledger)?;
    value["blocks"][1]["transactions"][0]["amount"] = serde_json::json!(2_500);
    let forged: Ledger = serde_json::from_value(value.clone())?;
    println!("\n🕵️  Changed Alice->Bob amount to 2500 in block 1");
    println!("   Valid: {:?}", forged.is_valid());

    value["blocks"][1]["transactions"][0]["amount"] = serde_json::json!(25);
    value["blocks"][2]["transactions"][0]["amount"] = serde_json::json!(1_000_000);
    let forged: Ledger = serde_json::from_value(value)?;
    println!("🕵️  Changed Alice's reward to 1000000 in block 2");
    println!("   Valid: {:?}", forged.is_valid());

    let mut signed = Transaction::new(&a, &b, 1);
    let wrong_key = signed.sign(&bob);
    println!("\n🚫 Bob signing Alice's transfer: {:?}", wrong_key.err().map(|e| e.to_string()));

    Ok(())
}
