// The external key-value store the node persists into. The engine only needs
// get/set by key; sled backs it on disk and a HashMap backs it in tests.

use crate::error::{BlockchainError, Result};
use log::info;
use sled::{Db, Tree};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Serialized chain: `{ "blocks": [...] }`
pub const CHAIN_KEY: &str = "CHAIN";
/// Current difficulty as a decimal string
pub const DIFFICULTY_KEY: &str = "DIFFICULTY";
/// Mirrored transaction pool as a JSON array
pub const TRANSACTION_POOL_KEY: &str = "TRANSACTION_POOL";

const STORE_TREE: &str = "ledger";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<SledStore> {
        let db = sled::open(path)
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let tree = db
            .open_tree(STORE_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open store tree: {e}")))?;
        info!("Opened store at {}", path.display());
        Ok(SledStore { db, tree })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(bytes) = self.tree.get(key)? else {
            return Ok(None);
        };
        let value = String::from_utf8(bytes.to_vec()).map_err(|e| {
            BlockchainError::Serialization(format!("Value under {key} is not UTF-8: {e}"))
        })?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.tree.insert(key, value.as_bytes())?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| BlockchainError::Storage("memory store lock poisoned".to_string()))?;
        Ok(inner.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| BlockchainError::Storage("memory store lock poisoned".to_string()))?;
        inner.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_get_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get(CHAIN_KEY).unwrap(), None);
        store.set(CHAIN_KEY, "{\"blocks\":[]}").unwrap();
        assert_eq!(store.get(CHAIN_KEY).unwrap().as_deref(), Some("{\"blocks\":[]}"));
        store.set(CHAIN_KEY, "x").unwrap();
        assert_eq!(store.get(CHAIN_KEY).unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        {
            let store = SledStore::open(&path).unwrap();
            store.set(DIFFICULTY_KEY, "12").unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.get(DIFFICULTY_KEY).unwrap().as_deref(), Some("12"));
        assert_eq!(store.get(TRANSACTION_POOL_KEY).unwrap(), None);
    }
}
