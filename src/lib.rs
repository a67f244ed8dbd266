//! # Ledger Node - A Minimal Proof-of-Work Account Ledger
//!
//! An account-model blockchain node: signed transfers between addresses,
//! a transaction pool, proof-of-work mining and longest-valid-chain
//! synchronization between nodes.
//!
//! ## What's Here
//! - **Chain**: blocks linked by Keccak-256 hashes, validated and replaced
//!   under a longest-valid-chain rule
//! - **Mining**: cancellable proof-of-work on a dedicated worker thread, with
//!   fixed or mine-rate difficulty
//! - **Transactions**: secp256k1 recoverable signatures over the transaction
//!   hash, one fixed miner reward per block
//! - **Sync**: whole chains and single transactions exchanged over two
//!   publish/subscribe channels
//! - **Wallet**: deterministic or random key pairs, balances computed from
//!   the chain
//!
//! ## Layout
//! - `core/`: blocks, transactions, proof-of-work, difficulty, chain service
//! - `storage/`: key-value store, transaction pool, retry policy
//! - `network/`: publish/subscribe transport, sync listeners, node wiring
//! - `wallet/`: balances, key pairs, signing
//! - `config/`: settings from defaults, TOML and environment
//! - `utils/`: hashing, signatures, key derivation, pre-image encoding
//! - `cli/`: command-line arguments

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::Config;
pub use core::{
    Block, BlockService, CancelToken, Chain, ChainService, MiningWorker, ProofOfWork, Transaction,
    TransactionRequest, TransactionService, MINERS_REWARD, ZERO_ADDRESS,
};
pub use error::{BlockchainError, Result};
pub use network::{MemoryBroker, Node, NodeSync, PubSub};
pub use storage::{KeyValueStore, MemoryStore, PoolSource, SledStore, TransactionPool};
pub use utils::{crypto_hash, generate_key_pair, sign, verify_signature, HashEncoding, KeyPair};
pub use wallet::WalletService;
