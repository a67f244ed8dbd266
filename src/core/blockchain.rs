// This is the ledger itself: an ordered list of blocks plus the service that
// validates, extends and replaces it. All chain mutations go through one
// mutex; the proof-of-work search runs outside it so reads stay responsive
// while a block is being mined.

use crate::config::Config;
use crate::core::monetary::MINERS_REWARD;
use crate::core::{
    Block, BlockService, CancelToken, Transaction, TransactionRequest, TransactionService,
};
use crate::error::{BlockchainError, Result};
use crate::network::{PubSub, CHAIN_CHANNEL, TRANSACTION_CHANNEL};
use crate::storage::{KeyValueStore, RetryPolicy, TransactionPool, CHAIN_KEY};
use crate::utils::{from_json, hex_to_binary, to_json};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Serialized as `{ "blocks": [...] }`, the format stored under `CHAIN` and
/// published on the chain channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Chain {
    pub fn new(blocks: Vec<Block>) -> Chain {
        Chain { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn find(&self, number: i64) -> Option<&Block> {
        self.blocks.iter().find(|block| block.number == number)
    }
}

pub struct ChainService {
    chain: Mutex<Chain>,
    // Bumped under the chain lock on every mutation. A search that started
    // at an older epoch is stale and gets cancelled.
    epoch: AtomicU64,
    block_service: BlockService,
    transaction_service: TransactionService,
    pool: TransactionPool,
    store: Arc<dyn KeyValueStore>,
    pubsub: Arc<dyn PubSub>,
    retry: RetryPolicy,
}

impl ChainService {
    /// Restore the chain from the store, or start from a fresh genesis block
    /// when nothing is stored yet.
    pub fn load(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        pubsub: Arc<dyn PubSub>,
    ) -> Result<ChainService> {
        let retry = RetryPolicy::from_config(config);
        let block_service = BlockService::new(config, store.clone())?;
        let transaction_service = TransactionService::new(config.hash_encoding);
        let pool = TransactionPool::new(config.pool_source, store.clone(), retry);

        let stored = retry.run("chain read", || store.get(CHAIN_KEY))?;
        let chain = match stored {
            Some(raw) => {
                let chain: Chain = from_json(&raw)?;
                if chain.is_empty() {
                    Chain::new(vec![block_service.default_genesis()?])
                } else {
                    info!("Loaded chain of {} blocks from store", chain.len());
                    chain
                }
            }
            None => {
                info!("No stored chain, starting from genesis");
                Chain::new(vec![block_service.default_genesis()?])
            }
        };

        Ok(ChainService {
            chain: Mutex::new(chain),
            epoch: AtomicU64::new(0),
            block_service,
            transaction_service,
            pool,
            store,
            pubsub,
            retry,
        })
    }

    pub fn block_service(&self) -> &BlockService {
        &self.block_service
    }

    pub fn transaction_service(&self) -> &TransactionService {
        &self.transaction_service
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Snapshot of the whole chain.
    pub fn get_blocks(&self) -> Chain {
        self.lock_chain().clone()
    }

    pub fn get_block(&self, number: i64) -> Result<Block> {
        self.lock_chain()
            .find(number)
            .cloned()
            .ok_or_else(|| BlockchainError::NotFound(format!("block {number}")))
    }

    pub fn block_length(&self) -> usize {
        self.lock_chain().len()
    }

    pub fn last_block(&self) -> Result<Block> {
        self.lock_chain()
            .last()
            .cloned()
            .ok_or_else(|| BlockchainError::NotFound("chain is empty".to_string()))
    }

    /// Blocks must be numbered 1, 2, 3... in order. Every block from the
    /// second on must link to its predecessor's hash, hash to its own `hash`
    /// and carry the bit-string of that hash in `binary`. Returns
    /// `(true, length)` when the chain holds, otherwise `(false, n)` with `n`
    /// the position of the first offending block. Proof-of-work and
    /// difficulty are not re-checked here.
    pub fn is_valid_chain(&self, chain: &Chain) -> (bool, i64) {
        let encoding = self.block_service.encoding();
        for (position, block) in (1i64..).zip(&chain.blocks) {
            if block.number != position {
                debug!("Block at position {position} is numbered {}", block.number);
                return (false, position);
            }
        }
        for pair in chain.blocks.windows(2) {
            let (previous, block) = (&pair[0], &pair[1]);
            if block.parent_hash != previous.hash {
                debug!("Block {} does not link to its parent", block.number);
                return (false, block.number);
            }
            match block.has_valid_hash(encoding) {
                Ok(true) => {}
                _ => {
                    debug!("Block {} hash does not match its contents", block.number);
                    return (false, block.number);
                }
            }
            match hex_to_binary(&block.hash) {
                Ok(binary) if binary == block.binary => {}
                _ => {
                    debug!("Block {} binary does not match its hash", block.number);
                    return (false, block.number);
                }
            }
        }
        (true, chain.len() as i64)
    }

    /// At most one reward per block, paying exactly `MINERS_REWARD`.
    pub fn is_valid_transaction_data(&self, chain: &Chain) -> Result<()> {
        for block in &chain.blocks {
            let mut rewards = 0;
            for reward in block.reward_transactions() {
                rewards += 1;
                if rewards > 1 {
                    return Err(BlockchainError::Validation(format!(
                        "block {} has more than one reward transaction",
                        block.number
                    )));
                }
                if reward.value != MINERS_REWARD {
                    return Err(BlockchainError::Validation(format!(
                        "block {} pays a reward of {} instead of {MINERS_REWARD}",
                        block.number, reward.value
                    )));
                }
            }
        }
        Ok(())
    }

    /// Adopt a strictly longer valid chain. The pool is emptied, the new chain
    /// persisted and then broadcast.
    pub fn replace_chain(&self, candidate: Chain) -> Result<()> {
        let json = {
            let mut chain = self.lock_chain();
            if candidate.len() <= chain.len() {
                return Err(BlockchainError::consensus(
                    format!(
                        "received chain of {} blocks is not longer than the current {}",
                        candidate.len(),
                        chain.len()
                    ),
                    candidate.len() as i64,
                ));
            }

            let (valid, block_number) = self.is_valid_chain(&candidate);
            if !valid {
                warn!("Rejected chain: invalid at block {block_number}");
                return Err(BlockchainError::consensus(
                    "received chain is invalid",
                    block_number,
                ));
            }
            self.is_valid_transaction_data(&candidate)?;

            info!(
                "Replacing chain of {} blocks with {} blocks",
                chain.len(),
                candidate.len()
            );
            *chain = candidate;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = self.pool.clear() {
                error!("Failed to clear transaction pool after chain replacement: {e}");
            }
            self.persist(&chain)
        };

        self.broadcast_chain(json);
        Ok(())
    }

    /// Append when `block.number` is the next number after the tip, otherwise
    /// overwrite the block with that number. Persisted, not broadcast.
    pub fn replace_block(&self, block: Block) -> Result<()> {
        let mut chain = self.lock_chain();
        Self::put_block(&mut chain, block)?;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.persist(&chain);
        Ok(())
    }

    /// Build a genesis block from the given nonce and difficulty and install
    /// it as block 1.
    pub fn new_genesis_block(&self, nonce: i64, difficulty: i64) -> Result<Block> {
        let genesis = self.block_service.genesis(nonce, difficulty)?;
        self.replace_block(genesis.clone())?;
        Ok(genesis)
    }

    /// Back to a single genesis block built from the configured values.
    pub fn reset(&self) -> Result<()> {
        let genesis = self.block_service.default_genesis()?;
        let json = {
            let mut chain = self.lock_chain();
            *chain = Chain::new(vec![genesis]);
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = self.pool.clear() {
                error!("Failed to clear transaction pool on reset: {e}");
            }
            info!("Chain reset to genesis");
            self.persist(&chain)
        };
        self.broadcast_chain(json);
        Ok(())
    }

    /// Mine the pooled transactions plus a fresh reward for `miner` into a
    /// block at `position` (-1 for the tip). The search runs without the
    /// chain lock and stops when `cancel` fires or the chain changes under it.
    /// Only the transactions in the mining snapshot leave the pool; anything
    /// pooled during the search waits for the next block.
    pub fn new_block(
        &self,
        data: &str,
        miner: &str,
        position: i64,
        cancel: &CancelToken,
    ) -> Result<Block> {
        // Parent, pool contents and epoch come from one snapshot.
        let (parent, transactions, epoch) = {
            let chain = self.lock_chain();
            let parent = Self::parent_for(&chain, position)?;

            let mut transactions: Vec<Transaction> = self
                .pool
                .get_transactions()?
                .into_iter()
                .filter(|tx| !tx.is_reward())
                .collect();
            transactions.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.hash.cmp(&b.hash))
            });
            transactions.insert(0, self.transaction_service.reward_transaction(miner));

            (parent, transactions, self.epoch())
        };

        let block = self.block_service.new_block(
            &parent,
            transactions,
            data,
            miner,
            position,
            &|| cancel.is_cancelled() || self.epoch() != epoch,
        )?;

        let json = {
            let mut chain = self.lock_chain();
            if self.epoch() != epoch {
                return Err(BlockchainError::Cancelled(format!(
                    "chain changed while mining block {}",
                    block.number
                )));
            }
            Self::put_block(&mut chain, block.clone())?;
            self.epoch.fetch_add(1, Ordering::SeqCst);

            let mined: Vec<String> = block.transactions.iter().map(|tx| tx.hash.clone()).collect();
            if let Err(e) = self.pool.remove_transactions(&mined) {
                error!("Failed to remove mined transactions from pool: {e}");
            }
            info!(
                "Installed block {} ({} transactions, difficulty {})",
                block.number,
                block.transactions.len(),
                block.difficulty
            );
            self.persist(&chain)
        };

        self.broadcast_chain(json);
        Ok(block)
    }

    /// Validate a client transaction, pool it and announce it to peers.
    pub fn submit_transaction(&self, request: &TransactionRequest) -> Result<Transaction> {
        let transaction = self.transaction_service.create_transaction(request)?;
        if !self.pool.set_transaction(transaction.clone())? {
            debug!("Transaction {} was already pooled", transaction.hash);
            return Ok(transaction);
        }

        let json = to_json(&transaction)?;
        if let Err(e) = self.retry.run("transaction publish", || {
            self.pubsub.publish(TRANSACTION_CHANNEL, &json)
        }) {
            error!("Failed to broadcast transaction {}: {e}", transaction.hash);
        }
        Ok(transaction)
    }

    pub fn get_transaction(&self, hash: &str) -> Result<Transaction> {
        self.lock_chain()
            .blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .find(|tx| tx.hash == hash)
            .cloned()
            .ok_or_else(|| BlockchainError::NotFound(format!("transaction {hash}")))
    }

    /// Confirmed transactions sent from `address`, oldest block first.
    pub fn get_transaction_history(&self, address: &str) -> Vec<Transaction> {
        self.lock_chain()
            .blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.from == address)
            .cloned()
            .collect()
    }

    fn parent_for(chain: &Chain, position: i64) -> Result<Block> {
        if position != -1 && position < 1 {
            return Err(BlockchainError::Validation(format!(
                "invalid block position {position}"
            )));
        }
        let tip = chain
            .last()
            .ok_or_else(|| BlockchainError::NotFound("chain is empty".to_string()))?;
        if position > chain.len() as i64 + 1 {
            return Err(BlockchainError::Validation(format!(
                "block position {position} is past the next block {}",
                chain.len() + 1
            )));
        }
        if position == -1 {
            return Ok(tip.clone());
        }
        Ok(chain.find(position - 1).unwrap_or(tip).clone())
    }

    fn put_block(chain: &mut Chain, block: Block) -> Result<()> {
        if block.number < 1 {
            return Err(BlockchainError::Validation(format!(
                "invalid block number {}",
                block.number
            )));
        }
        let next = chain.len() as i64 + 1;
        if block.number > next {
            return Err(BlockchainError::Validation(format!(
                "block {} would leave a gap after block {}",
                block.number,
                next - 1
            )));
        }
        if block.number == next {
            chain.blocks.push(block);
            return Ok(());
        }
        let number = block.number;
        match chain.blocks.iter_mut().find(|b| b.number == number) {
            Some(slot) => {
                *slot = block;
                Ok(())
            }
            None => Err(BlockchainError::NotFound(format!("block {number}"))),
        }
    }

    // Write-through under the chain lock; a failed write is logged and the
    // next mutation writes the full chain again.
    fn persist(&self, chain: &Chain) -> Option<String> {
        let json = match to_json(chain) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize chain: {e}");
                return None;
            }
        };
        if let Err(e) = self
            .retry
            .run("chain write", || self.store.set(CHAIN_KEY, &json))
        {
            error!("Failed to persist chain: {e}");
        }
        Some(json)
    }

    fn broadcast_chain(&self, json: Option<String>) {
        let Some(json) = json else {
            return;
        };
        match self
            .retry
            .run("chain publish", || self.pubsub.publish(CHAIN_CHANNEL, &json))
        {
            Ok(receivers) => debug!("Broadcast chain to {receivers} subscribers"),
            Err(e) => error!("Failed to broadcast chain: {e}"),
        }
    }

    fn lock_chain(&self) -> MutexGuard<'_, Chain> {
        match self.chain.lock() {
            Ok(chain) => chain,
            Err(poisoned) => {
                error!("Chain lock was poisoned");
                poisoned.into_inner()
            }
        }
    }
}
