use crate::config::Config;
use crate::core::{Block, ChainService, MiningWorker, Transaction, TransactionRequest};
use crate::error::Result;
use crate::network::{NodeSync, PubSub, SyncHandle};
use crate::storage::KeyValueStore;
use crate::wallet::WalletService;
use log::info;
use std::sync::Arc;

/// A running node: chain service, mining worker, sync listeners and wallet
/// over one store and one transport.
pub struct Node {
    chain: Arc<ChainService>,
    wallet: WalletService,
    worker: MiningWorker,
    sync: Option<SyncHandle>,
}

impl Node {
    pub fn start(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        pubsub: Arc<dyn PubSub>,
    ) -> Result<Node> {
        let chain = Arc::new(ChainService::load(config, store, pubsub.clone())?);
        let sync = Arc::new(NodeSync::new(Arc::clone(&chain))).start(pubsub.as_ref())?;
        let worker = MiningWorker::spawn(Arc::clone(&chain))?;
        let wallet = WalletService::new(Arc::clone(&chain));

        info!(
            "Node started with {} blocks, difficulty {}",
            chain.block_length(),
            chain.block_service().get_difficulty()
        );
        Ok(Node {
            chain,
            wallet,
            worker,
            sync: Some(sync),
        })
    }

    /// Start without sync listeners, for one-shot commands.
    pub fn offline(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        pubsub: Arc<dyn PubSub>,
    ) -> Result<Node> {
        let chain = Arc::new(ChainService::load(config, store, pubsub)?);
        let worker = MiningWorker::spawn(Arc::clone(&chain))?;
        let wallet = WalletService::new(Arc::clone(&chain));
        Ok(Node {
            chain,
            wallet,
            worker,
            sync: None,
        })
    }

    pub fn chain(&self) -> &Arc<ChainService> {
        &self.chain
    }

    pub fn wallet(&self) -> &WalletService {
        &self.wallet
    }

    pub fn worker(&self) -> &MiningWorker {
        &self.worker
    }

    /// Mine on the worker thread and wait for the block.
    pub fn mine(&self, data: &str, miner: &str, position: i64) -> Result<Block> {
        self.worker.mine(data, miner, position)
    }

    pub fn submit_transaction(&self, request: &TransactionRequest) -> Result<Transaction> {
        self.chain.submit_transaction(request)
    }

    /// Stop the worker and wait for the sync listeners, which end once the
    /// transport disconnects.
    pub fn shutdown(self) {
        let Node { worker, sync, .. } = self;
        worker.shutdown();
        if let Some(sync) = sync {
            sync.join();
        }
    }
}
