use pow_ledger::core::{Block, Ledger, LedgerConfig, Transaction, TransactionError};
use pow_ledger::crypto::KeyPair;
use pow_ledger::mining::{CancelFlag, Miner};
use pow_ledger::ValidationError;

const REWARD: u64 = 100;

fn new_ledger() -> Ledger {
    Ledger::with_config(LedgerConfig {
        difficulty: 3,
        mining_reward: REWARD,
        workers: 2,
    })
    .unwrap()
}

fn signed(from: &KeyPair, to: &str, amount: u64) -> Transaction {
    let mut tx = Transaction::new(&from.public_key_hex(), to, amount);
    tx.sign(from).unwrap();
    tx
}

#[test]
fn test_end_to_end_transfer() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let (a, b) = (alice.public_key_hex(), bob.public_key_hex());

    let mut ledger = new_ledger();
    assert_eq!(ledger.blocks().len(), 1);
    assert!(ledger.is_valid().is_ok());

    ledger.add_transaction(signed(&alice, &b, 25)).unwrap();
    ledger.mine_pending_transactions(&a).unwrap();

    assert_eq!(ledger.blocks().len(), 2);
    assert_eq!(ledger.get_balance(&b), 25);
    assert!(ledger.is_valid().is_ok());

    ledger.mine_pending_transactions(&a).unwrap();
    assert_eq!(ledger.get_balance(&a), REWARD as i128 - 25);
    assert!(ledger.is_valid().is_ok());

    for block in ledger.blocks() {
        assert!(block.hash.starts_with("000"));
    }
}

#[test]
fn test_rejections_leave_pending_untouched() {
    let alice = KeyPair::generate();
    let mallory = KeyPair::generate();
    let mut ledger = new_ledger();

    let mut stolen = Transaction::new(&alice.public_key_hex(), "mallory", 10);
    assert!(matches!(
        stolen.sign(&mallory),
        Err(TransactionError::Unauthorized)
    ));
    assert!(matches!(
        ledger.add_transaction(stolen),
        Err(TransactionError::MissingSignature)
    ));

    let mut forged = signed(&mallory, "mallory", 10);
    forged.from_address = Some(alice.public_key_hex());
    assert!(matches!(
        ledger.add_transaction(forged),
        Err(TransactionError::InvalidSignature)
    ));

    assert!(ledger.pending_transactions().is_empty());
}

#[test]
fn test_block_detects_tampering_after_mining() {
    let alice = KeyPair::generate();
    let mut block = Block::new(
        "0".repeat(64),
        vec![Transaction::reward("miner", REWARD), signed(&alice, "bob", 7)],
    );
    Miner::new(3).mine(&mut block, 3, &CancelFlag::new()).unwrap();
    assert!(block.verify_hash());
    assert!(block.all_transactions_valid());

    block.transactions[0].amount += 1;
    assert!(!block.verify_hash());
    assert!(block.all_transactions_valid());

    block.transactions[0].amount -= 1;
    block.transactions[1].to_address = "mallory".to_string();
    assert!(!block.all_transactions_valid());
}

#[test]
fn test_reloaded_ledger_keeps_growing() {
    let alice = KeyPair::generate();
    let mut ledger = new_ledger();
    ledger.add_transaction(signed(&alice, "bob", 5)).unwrap();
    ledger.mine_pending_transactions("miner").unwrap();

    let json = serde_json::to_string(&ledger).unwrap();
    let mut reloaded: Ledger = serde_json::from_str(&json).unwrap();
    reloaded.mine_pending_transactions("miner").unwrap();

    assert_eq!(reloaded.blocks().len(), 3);
    assert_eq!(reloaded.get_balance("miner"), REWARD as i128);
    assert_eq!(reloaded.is_valid(), Ok::<(), ValidationError>(()));
}
