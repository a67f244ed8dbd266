// Account view over the chain: balances are recomputed from every mined
// transaction on each call, nothing is cached.

use crate::core::{is_zero_address, ChainService, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{
    decode_hex, generate_key_pair, key_pair_from_private_key, sign, verify_signature, KeyPair,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct WalletService {
    chain: Arc<ChainService>,
}

impl WalletService {
    pub fn new(chain: Arc<ChainService>) -> WalletService {
        WalletService { chain }
    }

    /// Random for an empty phrase, deterministic otherwise.
    pub fn generate_key_pair(&self, seed_phrase: &str) -> Result<KeyPair> {
        generate_key_pair(seed_phrase)
    }

    pub fn key_pair_from_private_key(&self, private_key: &str) -> Result<KeyPair> {
        key_pair_from_private_key(private_key)
    }

    /// Signature over the raw bytes of `transaction.hash`.
    pub fn sign_transaction(&self, transaction: &Transaction, private_key: &str) -> Result<String> {
        sign_hash(&transaction.hash, private_key)
    }

    /// Received minus sent, over the whole chain. Fails when the sum does
    /// not fit in an `i64`, which only a chain full of forged values reaches.
    pub fn calculate_balance(&self, address: &str) -> Result<i64> {
        let chain = self.chain.get_blocks();
        let mut balance = 0i64;
        for tx in chain.blocks.iter().flat_map(|block| block.transactions.iter()) {
            if tx.from == address {
                balance = debit(balance, tx, address)?;
            }
            if tx.to == address {
                balance = credit(balance, tx, address)?;
            }
        }
        Ok(balance)
    }

    /// Balance of every address that appears in the chain, except the
    /// reward sender.
    pub fn calculate_all_balances(&self) -> Result<BTreeMap<String, i64>> {
        let chain = self.chain.get_blocks();
        let mut balances: BTreeMap<String, i64> = BTreeMap::new();
        for tx in chain.blocks.iter().flat_map(|block| block.transactions.iter()) {
            let sender = balances.entry(tx.from.clone()).or_insert(0);
            *sender = debit(*sender, tx, &tx.from)?;
            let recipient = balances.entry(tx.to.clone()).or_insert(0);
            *recipient = credit(*recipient, tx, &tx.to)?;
        }
        balances.retain(|address, _| !is_zero_address(address));
        Ok(balances)
    }

    pub fn get_transaction_history(&self, address: &str) -> Vec<Transaction> {
        self.chain.get_transaction_history(address)
    }
}

fn debit(balance: i64, tx: &Transaction, address: &str) -> Result<i64> {
    balance.checked_sub(tx.value).ok_or_else(|| overflow(tx, address))
}

fn credit(balance: i64, tx: &Transaction, address: &str) -> Result<i64> {
    balance.checked_add(tx.value).ok_or_else(|| overflow(tx, address))
}

fn overflow(tx: &Transaction, address: &str) -> BlockchainError {
    BlockchainError::Validation(format!(
        "balance of {address} overflows at transaction {}",
        tx.hash
    ))
}

pub fn sign_hash(tx_hash: &str, private_key: &str) -> Result<String> {
    let digest = decode_hex(tx_hash)?;
    sign(&digest, private_key)
}

/// `false` for any undecodable input.
pub fn verify(signature: &str, tx_hash: &str, public_key: &str) -> bool {
    match decode_hex(tx_hash) {
        Ok(digest) => verify_signature(public_key, &digest, signature),
        Err(_) => false,
    }
}
