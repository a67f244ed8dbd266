use crate::core::Block;
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Difficulty is the count of leading zero bits; a Keccak-256 hash has 256.
pub const MIN_DIFFICULTY: i64 = 1;
pub const MAX_DIFFICULTY: i64 = 256;

/// Decides the difficulty a candidate block is mined at.
pub trait DifficultyPolicy: Send + Sync {
    /// `current` is the node's configured difficulty, `parent` the block being
    /// extended and `timestamp` the candidate's timestamp in seconds.
    fn next_difficulty(&self, current: i64, parent: &Block, timestamp: i64) -> i64;
}

/// Every block is mined at the node's configured difficulty.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDifficulty;

impl DifficultyPolicy for FixedDifficulty {
    fn next_difficulty(&self, current: i64, _parent: &Block, _timestamp: i64) -> i64 {
        current
    }
}

/// Moves one step away from the parent's difficulty per block: down when the
/// gap since the parent exceeds the mine rate, up otherwise.
#[derive(Debug, Clone, Copy)]
pub struct MineRateAdjustment {
    mine_rate: i64,
}

impl MineRateAdjustment {
    pub fn new(mine_rate: i64) -> MineRateAdjustment {
        MineRateAdjustment { mine_rate }
    }
}

impl DifficultyPolicy for MineRateAdjustment {
    fn next_difficulty(&self, _current: i64, parent: &Block, timestamp: i64) -> i64 {
        let difficulty = parent.difficulty;
        if difficulty < MIN_DIFFICULTY {
            return MIN_DIFFICULTY;
        }
        let difficulty = difficulty.min(MAX_DIFFICULTY);

        // Peer blocks carry arbitrary timestamps.
        let adjusted = if timestamp.saturating_sub(parent.timestamp) > self.mine_rate {
            difficulty - 1
        } else {
            difficulty + 1
        };
        adjusted.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifficultyMode {
    #[default]
    Fixed,
    MineRate,
}

impl DifficultyMode {
    pub fn build(self, mine_rate_secs: i64) -> Box<dyn DifficultyPolicy> {
        match self {
            DifficultyMode::Fixed => Box::new(FixedDifficulty),
            DifficultyMode::MineRate => Box::new(MineRateAdjustment::new(mine_rate_secs)),
        }
    }
}

impl FromStr for DifficultyMode {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(DifficultyMode::Fixed),
            "minerate" | "mine-rate" | "mine_rate" => Ok(DifficultyMode::MineRate),
            _ => Err(BlockchainError::Config(format!(
                "Invalid difficulty policy: {s}. Valid options: Fixed, MineRate"
            ))),
        }
    }
}

pub fn validate_difficulty(difficulty: i64) -> Result<()> {
    if difficulty < MIN_DIFFICULTY {
        return Err(BlockchainError::Validation(
            "difficulty must be greater than 0".to_string(),
        ));
    }
    if difficulty > MAX_DIFFICULTY {
        return Err(BlockchainError::Validation(format!(
            "difficulty must not exceed {MAX_DIFFICULTY}"
        )));
    }
    Ok(())
}
