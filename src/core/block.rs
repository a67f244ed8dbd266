use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{crypto_hash, hex_to_binary, to_json, HashEncoding, Preimage};
use serde::{Deserialize, Serialize};

/// Parent hash and miner of the genesis block
pub const GENESIS_PARENT_HASH: &str = "0x";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "block_number")]
    pub number: i64,
    pub hash: String,
    /// Bit-string form of `hash`, used for the proof-of-work check
    pub binary: String,
    pub parent_hash: String,
    pub nonce: i64,
    pub difficulty: i64,
    pub timestamp: i64,
    pub miner: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub data: String,
}

impl Block {
    /// Block number 1. Never mined, so its hash carries no proof of work.
    pub fn genesis(nonce: i64, difficulty: i64, encoding: HashEncoding) -> Result<Block> {
        let mut block = Block {
            number: 1,
            hash: String::new(),
            binary: String::new(),
            parent_hash: GENESIS_PARENT_HASH.to_string(),
            nonce,
            difficulty,
            timestamp: 0,
            miner: GENESIS_PARENT_HASH.to_string(),
            transactions: vec![],
            data: String::new(),
        };
        block.seal(encoding)?;
        Ok(block)
    }

    /// HashBlock over number, parent hash, nonce, difficulty, timestamp,
    /// miner, the JSON transaction list and data.
    pub fn compute_hash(&self, encoding: HashEncoding) -> Result<String> {
        let transactions = to_json(&self.transactions)?;
        let preimage = Preimage::new(encoding)
            .push_int(self.number)
            .push_str(&self.parent_hash)
            .push_nonce(self.nonce)
            .push_int(self.difficulty)
            .push_int(self.timestamp)
            .push_str(&self.miner)
            .push_str(&transactions)
            .push_str(&self.data)
            .finish();
        Ok(crypto_hash(&preimage).to_hex())
    }

    /// Recompute `hash` and `binary` from the other fields.
    pub fn seal(&mut self, encoding: HashEncoding) -> Result<()> {
        self.hash = self.compute_hash(encoding)?;
        self.binary = hex_to_binary(&self.hash)?;
        Ok(())
    }

    pub fn has_valid_hash(&self, encoding: HashEncoding) -> Result<bool> {
        Ok(self.compute_hash(encoding)? == self.hash)
    }

    pub fn reward_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_reward())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionService;

    fn sample_block() -> Block {
        let service = TransactionService::default();
        let mut block = Block {
            number: 2,
            parent_hash: "0xabc".to_string(),
            nonce: 17,
            difficulty: 3,
            timestamp: 1_700_000_000,
            miner: "0xMiner".to_string(),
            transactions: vec![service.reward_transaction("0xMiner")],
            data: "hello".to_string(),
            ..Block::default()
        };
        block.seal(HashEncoding::default()).unwrap();
        block
    }

    #[test]
    fn test_genesis_fields() {
        let genesis = Block::genesis(0, 10, HashEncoding::default()).unwrap();
        assert_eq!(genesis.number, 1);
        assert_eq!(genesis.parent_hash, "0x");
        assert_eq!(genesis.difficulty, 10);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.binary.len(), 256);
        assert!(genesis.has_valid_hash(HashEncoding::default()).unwrap());
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = Block::genesis(3, 5, HashEncoding::default()).unwrap();
        let b = Block::genesis(3, 5, HashEncoding::default()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.hash, Block::genesis(4, 5, HashEncoding::default()).unwrap().hash);
    }

    #[test]
    fn test_hash_is_pure() {
        let block = sample_block();
        let encoding = HashEncoding::default();
        assert_eq!(
            block.compute_hash(encoding).unwrap(),
            block.clone().compute_hash(encoding).unwrap()
        );
    }

    #[test]
    fn test_every_field_changes_hash() {
        let block = sample_block();
        let encoding = HashEncoding::default();
        let original = block.compute_hash(encoding).unwrap();

        let mutations: Vec<Box<dyn Fn(&mut Block)>> = vec![
            Box::new(|b: &mut Block| b.number += 1),
            Box::new(|b: &mut Block| b.parent_hash.push('0')),
            Box::new(|b: &mut Block| b.nonce += 1),
            Box::new(|b: &mut Block| b.difficulty += 1),
            Box::new(|b: &mut Block| b.timestamp += 1),
            Box::new(|b: &mut Block| b.miner.push('x')),
            Box::new(|b: &mut Block| b.transactions[0].value += 1),
            Box::new(|b: &mut Block| b.data.push('!')),
        ];
        for mutate in mutations {
            let mut changed = block.clone();
            mutate(&mut changed);
            assert_ne!(changed.compute_hash(encoding).unwrap(), original);
        }
    }

    #[test]
    fn test_hash_ignores_binary_and_hash_fields() {
        let block = sample_block();
        let mut changed = block.clone();
        changed.binary = String::new();
        changed.hash = "0x00".to_string();
        assert_eq!(
            changed.compute_hash(HashEncoding::default()).unwrap(),
            block.hash
        );
    }

    #[test]
    fn test_json_field_names() {
        let block = sample_block();
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["block_number"], 2);
        assert_eq!(json["parent_hash"], "0xabc");
        assert!(json["transactions"].is_array());
    }

    #[test]
    fn test_reward_transactions_filter() {
        let block = sample_block();
        assert_eq!(block.reward_transactions().count(), 1);
    }
}
