use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::storage::{KeyValueStore, RetryPolicy, TRANSACTION_POOL_KEY};
use crate::utils::{from_json, to_json};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

/// Where the pool's contents live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolSource {
    /// Process-local map only
    #[default]
    Mempool,
    /// Mirrored under `TRANSACTION_POOL` in the key-value store, so nodes
    /// sharing a store share a pool
    Store,
}

impl FromStr for PoolSource {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mempool" => Ok(PoolSource::Mempool),
            "store" | "redis" => Ok(PoolSource::Store),
            _ => Err(BlockchainError::Config(format!(
                "Invalid pool source: {s}. Valid options: Mempool, Store"
            ))),
        }
    }
}

/// Pending transactions keyed by hash ( K -> tx hash, V => Transaction ).
/// First writer wins: re-inserting a known hash is a no-op.
pub struct TransactionPool {
    source: RwLock<PoolSource>,
    inner: RwLock<HashMap<String, Transaction>>,
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
}

impl TransactionPool {
    pub fn new(
        source: PoolSource,
        store: Arc<dyn KeyValueStore>,
        retry: RetryPolicy,
    ) -> TransactionPool {
        TransactionPool {
            source: RwLock::new(source),
            inner: RwLock::new(HashMap::new()),
            store,
            retry,
        }
    }

    pub fn source_type(&self) -> PoolSource {
        match self.source.read() {
            Ok(source) => *source,
            Err(_) => {
                log::error!("Failed to acquire read lock on pool source");
                PoolSource::Mempool
            }
        }
    }

    /// Switch backing source. Moving to `Store` merges the local entries
    /// into whatever the store already holds. Locks are always taken
    /// source first, then pool.
    pub fn configure(&self, source: PoolSource) -> Result<()> {
        let mut current = self
            .source
            .write()
            .map_err(|_| BlockchainError::Storage("pool source lock poisoned".to_string()))?;
        if *current == source {
            return Ok(());
        }

        if source == PoolSource::Store {
            let mut pool = self.lock_pool()?;
            let stored = self.load_from_store()?;
            for (hash, transaction) in stored {
                pool.entry(hash).or_insert(transaction);
            }
            self.save_to_store(&pool)?;
        }

        info!("Transaction pool source changed from {:?} to {:?}", *current, source);
        *current = source;
        Ok(())
    }

    /// Returns false when a transaction with the same hash is already pooled.
    pub fn set_transaction(&self, transaction: Transaction) -> Result<bool> {
        let store_backed = self.source_type() == PoolSource::Store;
        let mut pool = self.lock_pool()?;
        if store_backed {
            *pool = self.load_from_store()?;
        }

        if pool.contains_key(&transaction.hash) {
            debug!("Transaction {} already in pool", transaction.hash);
            return Ok(false);
        }

        let hash = transaction.hash.clone();
        pool.insert(hash.clone(), transaction);
        if store_backed {
            self.save_to_store(&pool)?;
        }
        debug!("Added transaction {hash} to pool");
        Ok(true)
    }

    pub fn get_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.get_transaction_pool()?.into_values().collect())
    }

    pub fn get_transaction_pool(&self) -> Result<HashMap<String, Transaction>> {
        if self.source_type() == PoolSource::Store {
            match self.load_from_store() {
                Ok(stored) => {
                    let mut pool = self.lock_pool()?;
                    *pool = stored.clone();
                    return Ok(stored);
                }
                Err(e) => warn!("Reading pool from store failed, using local copy: {e}"),
            }
        }

        match self.inner.read() {
            Ok(pool) => Ok(pool.clone()),
            Err(_) => Err(BlockchainError::Storage(
                "transaction pool lock poisoned".to_string(),
            )),
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        match self.get_transaction_pool() {
            Ok(pool) => pool.contains_key(hash),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.get_transaction_pool().map(|pool| pool.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop only the given hashes; anything inserted meanwhile stays.
    pub fn remove_transactions(&self, hashes: &[String]) -> Result<()> {
        let store_backed = self.source_type() == PoolSource::Store;
        let mut pool = self.lock_pool()?;
        if store_backed {
            *pool = self.load_from_store()?;
        }
        for hash in hashes {
            pool.remove(hash);
        }
        if store_backed {
            self.save_to_store(&pool)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let store_backed = self.source_type() == PoolSource::Store;
        let mut pool = self.lock_pool()?;
        pool.clear();
        if store_backed {
            self.save_to_store(&pool)?;
        }
        debug!("Transaction pool cleared");
        Ok(())
    }

    fn lock_pool(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Transaction>>> {
        self.inner
            .write()
            .map_err(|_| BlockchainError::Storage("transaction pool lock poisoned".to_string()))
    }

    fn load_from_store(&self) -> Result<HashMap<String, Transaction>> {
        let raw = self
            .retry
            .run("pool read", || self.store.get(TRANSACTION_POOL_KEY))?;
        let Some(raw) = raw else {
            return Ok(HashMap::new());
        };
        let transactions: Vec<Transaction> = from_json(&raw)?;
        Ok(transactions
            .into_iter()
            .map(|tx| (tx.hash.clone(), tx))
            .collect())
    }

    fn save_to_store(&self, pool: &HashMap<String, Transaction>) -> Result<()> {
        let mut transactions: Vec<&Transaction> = pool.values().collect();
        transactions.sort_by(|a, b| a.hash.cmp(&b.hash));
        let json = to_json(&transactions)?;
        self.retry
            .run("pool write", || self.store.set(TRANSACTION_POOL_KEY, &json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn transaction(hash: &str) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            value: 1,
            data: "d".to_string(),
            timestamp: 1,
            ..Transaction::default()
        }
    }

    fn pool(source: PoolSource, store: Arc<dyn KeyValueStore>) -> TransactionPool {
        TransactionPool::new(source, store, RetryPolicy::new(1, Duration::ZERO))
    }

    #[test]
    fn test_first_writer_wins() {
        let pool = pool(PoolSource::Mempool, Arc::new(MemoryStore::new()));
        let mut first = transaction("0x01");
        first.data = "first".to_string();
        let mut second = transaction("0x01");
        second.data = "second".to_string();

        assert!(pool.set_transaction(first).unwrap());
        assert!(!pool.set_transaction(second).unwrap());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get_transaction_pool().unwrap()["0x01"].data, "first");
    }

    #[test]
    fn test_remove_only_named_transactions() {
        let pool = pool(PoolSource::Mempool, Arc::new(MemoryStore::new()));
        pool.set_transaction(transaction("0x01")).unwrap();
        pool.set_transaction(transaction("0x02")).unwrap();

        pool.remove_transactions(&["0x01".to_string()]).unwrap();
        assert!(!pool.contains("0x01"));
        assert!(pool.contains("0x02"));

        pool.clear().unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_mempool_does_not_touch_store() {
        let store = Arc::new(MemoryStore::new());
        let pool = pool(PoolSource::Mempool, store.clone());
        pool.set_transaction(transaction("0x01")).unwrap();
        assert_eq!(store.get(TRANSACTION_POOL_KEY).unwrap(), None);
    }

    #[test]
    fn test_store_backed_pools_share_contents() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = pool(PoolSource::Store, store.clone());
        let b = pool(PoolSource::Store, store.clone());

        assert!(a.set_transaction(transaction("0x01")).unwrap());
        assert!(!b.set_transaction(transaction("0x01")).unwrap());
        assert!(b.set_transaction(transaction("0x02")).unwrap());
        assert_eq!(a.len(), 2);

        a.clear().unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn test_configure_to_store_merges_local_entries() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let shared = pool(PoolSource::Store, store.clone());
        shared.set_transaction(transaction("0x01")).unwrap();

        let local = pool(PoolSource::Mempool, store.clone());
        local.set_transaction(transaction("0x02")).unwrap();
        local.configure(PoolSource::Store).unwrap();

        assert_eq!(local.source_type(), PoolSource::Store);
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn test_pool_source_parsing() {
        assert_eq!("Mempool".parse::<PoolSource>().unwrap(), PoolSource::Mempool);
        assert_eq!("store".parse::<PoolSource>().unwrap(), PoolSource::Store);
        assert_eq!("Redis".parse::<PoolSource>().unwrap(), PoolSource::Store);
        assert!("disk".parse::<PoolSource>().is_err());
    }
}
