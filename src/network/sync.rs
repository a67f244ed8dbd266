use crate::core::{Chain, ChainService, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::{PubSub, CHAIN_CHANNEL, TRANSACTION_CHANNEL};
use crate::utils::from_json;
use log::{debug, error, info, warn};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Applies chain and transaction messages from peers to the local node.
pub struct NodeSync {
    chain: Arc<ChainService>,
}

impl NodeSync {
    pub fn new(chain: Arc<ChainService>) -> NodeSync {
        NodeSync { chain }
    }

    /// A peer's chain replaces ours only when it is longer and valid.
    pub fn handle_chain_message(&self, payload: &str) -> Result<()> {
        let candidate: Chain = from_json(payload)?;
        self.chain.replace_chain(candidate)
    }

    /// Pool a peer's transaction unless it is a reward or its hash does not
    /// match its fields. Rewards only enter the chain inside mined blocks.
    /// Returns false for a transaction already pooled.
    pub fn handle_transaction_message(&self, payload: &str) -> Result<bool> {
        let transaction: Transaction = from_json(payload)?;
        if transaction.is_reward() {
            return Err(BlockchainError::Validation(format!(
                "reward transaction {} cannot be pooled",
                transaction.hash
            )));
        }
        let expected = self.chain.transaction_service().tx_hash(&transaction);
        if transaction.hash != expected {
            return Err(BlockchainError::Validation(format!(
                "transaction {} does not hash to its own fields",
                transaction.hash
            )));
        }
        self.chain.pool().set_transaction(transaction)
    }

    /// Subscribe to both channels and drain each on its own thread. The
    /// threads run until the transport disconnects.
    pub fn start(self: Arc<Self>, pubsub: &dyn PubSub) -> Result<SyncHandle> {
        let chains = pubsub.subscribe(CHAIN_CHANNEL)?;
        let transactions = pubsub.subscribe(TRANSACTION_CHANNEL)?;

        let chain_listener = {
            let sync = Arc::clone(&self);
            thread::Builder::new()
                .name("sync-chain".to_string())
                .spawn(move || sync.drain_chains(chains))?
        };
        let transaction_listener = {
            let sync = Arc::clone(&self);
            thread::Builder::new()
                .name("sync-transactions".to_string())
                .spawn(move || sync.drain_transactions(transactions))?
        };

        info!("Listening on {CHAIN_CHANNEL} and {TRANSACTION_CHANNEL}");
        Ok(SyncHandle {
            listeners: vec![chain_listener, transaction_listener],
        })
    }

    fn drain_chains(&self, messages: Receiver<String>) {
        for payload in messages {
            match self.handle_chain_message(&payload) {
                Ok(()) => info!("Adopted chain from peer"),
                // Our own broadcasts come back here and are never longer.
                Err(BlockchainError::Consensus {
                    message,
                    block_number,
                }) => debug!("Ignored peer chain ({message}, block {block_number})"),
                Err(e) => warn!("Rejected peer chain: {e}"),
            }
        }
        debug!("Chain listener stopped");
    }

    fn drain_transactions(&self, messages: Receiver<String>) {
        for payload in messages {
            match self.handle_transaction_message(&payload) {
                Ok(true) => debug!("Pooled transaction from peer"),
                Ok(false) => debug!("Peer transaction already pooled"),
                Err(e) if e.is_client_error() => warn!("Rejected peer transaction: {e}"),
                Err(e) => error!("Failed to pool peer transaction: {e}"),
            }
        }
        debug!("Transaction listener stopped");
    }
}

/// Listener threads started by `NodeSync::start`.
pub struct SyncHandle {
    listeners: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    /// Wait for the listeners; returns once the transport has disconnected.
    pub fn join(self) {
        for listener in self.listeners {
            if listener.join().is_err() {
                error!("Sync listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CancelToken;
    use crate::network::MemoryBroker;
    use crate::storage::MemoryStore;
    use crate::testnet::test_utils::{chain_service, signed_request};
    use crate::utils::{generate_key_pair, to_json};

    fn node() -> (Arc<ChainService>, NodeSync) {
        let chain = Arc::new(chain_service(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBroker::new()),
        ));
        (chain.clone(), NodeSync::new(chain))
    }

    #[test]
    fn test_longer_chain_message_is_adopted() {
        let (peer, _) = node();
        peer.new_block("", "0xMiner", -1, &CancelToken::new())
            .unwrap();

        let (local, sync) = node();
        sync.handle_chain_message(&to_json(&peer.get_blocks()).unwrap())
            .unwrap();
        assert_eq!(local.get_blocks(), peer.get_blocks());
    }

    #[test]
    fn test_bad_chain_messages_are_errors() {
        let (_, sync) = node();
        assert!(matches!(
            sync.handle_chain_message("{not json"),
            Err(BlockchainError::Serialization(_))
        ));
        let same = to_json(&Chain::default()).unwrap();
        assert!(matches!(
            sync.handle_chain_message(&same),
            Err(BlockchainError::Consensus { .. })
        ));
    }

    #[test]
    fn test_transaction_message_is_pooled_once() {
        let (local, sync) = node();
        let alice = generate_key_pair("alice").unwrap();
        let tx = local
            .transaction_service()
            .create_transaction(&signed_request(&alice, "0xBob", 3, "tip", 5))
            .unwrap();
        let payload = to_json(&tx).unwrap();

        assert!(sync.handle_transaction_message(&payload).unwrap());
        assert!(!sync.handle_transaction_message(&payload).unwrap());
        assert_eq!(local.pool().len(), 1);
    }

    #[test]
    fn test_transaction_with_forged_hash_is_rejected() {
        let (local, sync) = node();
        let alice = generate_key_pair("alice").unwrap();
        let mut tx = local
            .transaction_service()
            .create_transaction(&signed_request(&alice, "0xBob", 3, "tip", 5))
            .unwrap();
        tx.value = 1_000_000;
        let result = sync.handle_transaction_message(&to_json(&tx).unwrap());
        assert!(matches!(result, Err(BlockchainError::Validation(_))));
        assert!(local.pool().is_empty());
    }

    #[test]
    fn test_reward_message_is_not_pooled() {
        let (local, sync) = node();
        for to in ["0xX", "0xY", "0xZ"] {
            let reward = local.transaction_service().reward_transaction(to);
            let result = sync.handle_transaction_message(&to_json(&reward).unwrap());
            assert!(matches!(result, Err(BlockchainError::Validation(_))));
        }
        assert!(local.pool().is_empty());

        local
            .new_block("", "0xMiner", -1, &CancelToken::new())
            .unwrap();
        assert!(local.pool().is_empty());
    }

    #[test]
    fn test_listeners_stop_when_broker_closes() {
        let broker = Arc::new(MemoryBroker::new());
        let chain = Arc::new(chain_service(Arc::new(MemoryStore::new()), broker.clone()));
        let handle = Arc::new(NodeSync::new(chain)).start(broker.as_ref()).unwrap();
        broker.close();
        handle.join();
    }
}
