// The mining engine. It owns the node's current difficulty and the
// difficulty policy, builds genesis blocks, and runs proof-of-work for new
// candidates. It does not touch the chain itself; ChainService decides where
// a mined block goes.

use crate::config::Config;
use crate::core::difficulty::validate_difficulty;
use crate::core::{Block, DifficultyPolicy, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::{KeyValueStore, RetryPolicy, DIFFICULTY_KEY};
use crate::utils::HashEncoding;
use log::{info, warn};
use std::sync::{Arc, Mutex};

pub struct BlockService {
    difficulty: Mutex<i64>,
    policy: Box<dyn DifficultyPolicy>,
    encoding: HashEncoding,
    genesis_nonce: i64,
    genesis_difficulty: i64,
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
}

impl BlockService {
    /// Difficulty starts from the stored `DIFFICULTY` value when there is a
    /// valid one, otherwise from the configured initial difficulty.
    pub fn new(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<BlockService> {
        let retry = RetryPolicy::from_config(config);
        let stored = retry.run("difficulty read", || store.get(DIFFICULTY_KEY))?;

        let difficulty = match stored.map(|raw| raw.trim().parse::<i64>()) {
            Some(Ok(value)) if validate_difficulty(value).is_ok() => {
                info!("Loaded difficulty {value} from store");
                value
            }
            Some(_) => {
                warn!(
                    "Ignoring invalid stored difficulty, using {}",
                    config.initial_difficulty
                );
                config.initial_difficulty
            }
            None => config.initial_difficulty,
        };

        Ok(BlockService {
            difficulty: Mutex::new(difficulty),
            policy: config.difficulty_policy.build(config.mine_rate_secs),
            encoding: config.hash_encoding,
            genesis_nonce: config.genesis_nonce,
            genesis_difficulty: config.initial_difficulty,
            store,
            retry,
        })
    }

    pub fn encoding(&self) -> HashEncoding {
        self.encoding
    }

    pub fn genesis(&self, nonce: i64, difficulty: i64) -> Result<Block> {
        Block::genesis(nonce, difficulty, self.encoding)
    }

    /// Genesis block built from the configured nonce and initial difficulty.
    pub fn default_genesis(&self) -> Result<Block> {
        self.genesis(self.genesis_nonce, self.genesis_difficulty)
    }

    /// Mine a block on top of `last_block`. `position` is the block number to
    /// fill, or -1 for `last_block.number + 1`. Returns `Cancelled` as soon as
    /// `should_stop` reports true.
    pub fn new_block(
        &self,
        last_block: &Block,
        transactions: Vec<Transaction>,
        data: &str,
        miner: &str,
        position: i64,
        should_stop: &dyn Fn() -> bool,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(BlockchainError::Mining(
                "cannot mine a block without transactions".to_string(),
            ));
        }

        let number = match position {
            -1 => last_block.number.checked_add(1).ok_or_else(|| {
                BlockchainError::Validation(format!(
                    "block number {} has no successor",
                    last_block.number
                ))
            })?,
            n if n >= 1 => n,
            n => {
                return Err(BlockchainError::Validation(format!(
                    "invalid block position {n}"
                )))
            }
        };

        let candidate = Block {
            number,
            parent_hash: last_block.hash.clone(),
            miner: miner.to_string(),
            transactions,
            data: data.to_string(),
            ..Block::default()
        };

        let difficulty = self.get_difficulty();
        ProofOfWork::new_proof_of_work(
            candidate,
            last_block,
            self.policy.as_ref(),
            difficulty,
            self.encoding,
        )
        .run(should_stop)
    }

    pub fn get_difficulty(&self) -> i64 {
        match self.difficulty.lock() {
            Ok(difficulty) => *difficulty,
            Err(poisoned) => {
                log::error!("Difficulty lock was poisoned");
                *poisoned.into_inner()
            }
        }
    }

    /// Affects blocks mined after the call; in-flight searches keep the value
    /// they started with.
    pub fn set_difficulty(&self, difficulty: i64) -> Result<()> {
        validate_difficulty(difficulty)?;

        let mut current = self
            .difficulty
            .lock()
            .map_err(|_| BlockchainError::Mining("difficulty lock poisoned".to_string()))?;
        let value = difficulty.to_string();
        self.retry
            .run("difficulty write", || self.store.set(DIFFICULTY_KEY, &value))?;
        *current = difficulty;
        info!("Difficulty set to {difficulty}");
        Ok(())
    }

    /// Proof-of-work check for a block produced elsewhere.
    pub fn validate_block(&self, block: &Block) -> bool {
        ProofOfWork::validate(block, self.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{meets_difficulty, DifficultyMode, TransactionService};
    use crate::storage::MemoryStore;

    fn service_with(config: Config) -> (BlockService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = BlockService::new(&config, store.clone()).unwrap();
        (service, store)
    }

    fn low_difficulty() -> Config {
        Config {
            initial_difficulty: 4,
            ..Config::default()
        }
    }

    fn reward() -> Vec<Transaction> {
        vec![TransactionService::default().reward_transaction("0xMiner")]
    }

    #[test]
    fn test_new_block_extends_parent() {
        let (service, _) = service_with(low_difficulty());
        let genesis = service.default_genesis().unwrap();

        let block = service
            .new_block(&genesis, reward(), "payload", "0xMiner", -1, &|| false)
            .unwrap();
        assert_eq!(block.number, 2);
        assert_eq!(block.parent_hash, genesis.hash);
        assert_eq!(block.data, "payload");
        assert_eq!(block.miner, "0xMiner");
        assert!(meets_difficulty(&block.binary, 4));
        assert!(service.validate_block(&block));
    }

    #[test]
    fn test_explicit_position() {
        let (service, _) = service_with(low_difficulty());
        let genesis = service.default_genesis().unwrap();
        let block = service
            .new_block(&genesis, reward(), "", "0xMiner", 7, &|| false)
            .unwrap();
        assert_eq!(block.number, 7);
        assert!(service
            .new_block(&genesis, reward(), "", "0xMiner", 0, &|| false)
            .is_err());
    }

    #[test]
    fn test_last_block_number_overflow_is_an_error() {
        let (service, _) = service_with(low_difficulty());
        let mut parent = service.default_genesis().unwrap();
        parent.number = i64::MAX;
        let result = service.new_block(&parent, reward(), "", "0xMiner", -1, &|| false);
        assert!(matches!(result, Err(BlockchainError::Validation(_))));
    }

    #[test]
    fn test_empty_transactions_rejected() {
        let (service, _) = service_with(low_difficulty());
        let genesis = service.default_genesis().unwrap();
        let result = service.new_block(&genesis, vec![], "", "0xMiner", -1, &|| false);
        assert!(matches!(result, Err(BlockchainError::Mining(_))));
    }

    #[test]
    fn test_set_difficulty_persists() {
        let (service, store) = service_with(low_difficulty());
        service.set_difficulty(3).unwrap();
        assert_eq!(service.get_difficulty(), 3);
        assert_eq!(store.get(DIFFICULTY_KEY).unwrap().as_deref(), Some("3"));

        assert!(service.set_difficulty(0).is_err());
        assert!(service.set_difficulty(-1).is_err());
        assert_eq!(service.get_difficulty(), 3);
    }

    #[test]
    fn test_difficulty_loaded_from_store() {
        let store = Arc::new(MemoryStore::new());
        store.set(DIFFICULTY_KEY, "7").unwrap();
        let service = BlockService::new(&low_difficulty(), store.clone()).unwrap();
        assert_eq!(service.get_difficulty(), 7);

        store.set(DIFFICULTY_KEY, "not a number").unwrap();
        let service = BlockService::new(&low_difficulty(), store).unwrap();
        assert_eq!(service.get_difficulty(), 4);
    }

    #[test]
    fn test_genesis_ignores_current_difficulty() {
        let (service, _) = service_with(low_difficulty());
        service.set_difficulty(9).unwrap();
        assert_eq!(service.default_genesis().unwrap().difficulty, 4);
    }

    #[test]
    fn test_mine_rate_policy_is_used() {
        let (service, _) = service_with(Config {
            initial_difficulty: 2,
            difficulty_policy: DifficultyMode::MineRate,
            mine_rate_secs: 3600,
            ..Config::default()
        });
        let mut parent = service.genesis(0, 2).unwrap();
        parent.timestamp = crate::utils::current_timestamp().unwrap();

        let block = service
            .new_block(&parent, reward(), "", "0xMiner", -1, &|| false)
            .unwrap();
        assert_eq!(block.difficulty, 3);
    }
}
