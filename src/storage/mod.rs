//! Data storage and persistence
//!
//! The key-value store the node persists its chain, difficulty and (optionally)
//! transaction pool into, the pending transaction pool itself, and the retry
//! policy applied to store and transport calls.

pub mod memory_pool;
pub mod retry;
pub mod store;

pub use memory_pool::{PoolSource, TransactionPool};
pub use retry::RetryPolicy;
pub use store::{
    KeyValueStore, MemoryStore, SledStore, CHAIN_KEY, DIFFICULTY_KEY, TRANSACTION_POOL_KEY,
};
