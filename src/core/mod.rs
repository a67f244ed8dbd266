//! Core ledger functionality
//!
//! Blocks, account-model transactions, proof-of-work mining with pluggable
//! difficulty, and the chain service that validates, extends and replaces
//! the chain.

pub mod block;
pub mod block_service;
pub mod blockchain;
pub mod difficulty;
pub mod miner;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_PARENT_HASH};
pub use block_service::BlockService;
pub use blockchain::{Chain, ChainService};
pub use difficulty::{
    validate_difficulty, DifficultyMode, DifficultyPolicy, FixedDifficulty, MineRateAdjustment,
    MAX_DIFFICULTY, MIN_DIFFICULTY,
};
pub use miner::{MiningTicket, MiningWorker};
pub use monetary::{is_zero_address, MINERS_REWARD, ZERO_ADDRESS};
pub use proof_of_work::{meets_difficulty, CancelToken, ProofOfWork};
pub use transaction::{Transaction, TransactionRequest, TransactionService};
