use crate::core::{Block, DifficultyPolicy};
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, HashEncoding};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const MAX_NONCE: i64 = i64::MAX;

/// Shared flag an in-flight search polls once per nonce.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// True when the first `difficulty` characters of the bit string are all '0'.
pub fn meets_difficulty(binary: &str, difficulty: i64) -> bool {
    if difficulty <= 0 {
        return true;
    }
    let Ok(required) = usize::try_from(difficulty) else {
        return false;
    };
    binary.len() >= required && binary.as_bytes()[..required].iter().all(|b| *b == b'0')
}

pub struct ProofOfWork<'a> {
    block: Block,
    parent: &'a Block,
    policy: &'a dyn DifficultyPolicy,
    base_difficulty: i64,
    encoding: HashEncoding,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(
        block: Block,
        parent: &'a Block,
        policy: &'a dyn DifficultyPolicy,
        base_difficulty: i64,
        encoding: HashEncoding,
    ) -> ProofOfWork<'a> {
        ProofOfWork {
            block,
            parent,
            policy,
            base_difficulty,
            encoding,
        }
    }

    /// Hash matches the block's own fields and satisfies its difficulty.
    pub fn validate(block: &Block, encoding: HashEncoding) -> bool {
        match block.has_valid_hash(encoding) {
            Ok(true) => meets_difficulty(&block.binary, block.difficulty),
            _ => false,
        }
    }

    /// Bump the nonce, restamp the time and rehash until the leading-zero
    /// target is met. `should_stop` is checked before every attempt.
    pub fn run(mut self, should_stop: &dyn Fn() -> bool) -> Result<Block> {
        info!(
            "Mining block {} on parent {} (base difficulty {})",
            self.block.number, self.parent.hash, self.base_difficulty
        );

        while self.block.nonce < MAX_NONCE {
            if should_stop() {
                debug!(
                    "Mining of block {} stopped at nonce {}",
                    self.block.number, self.block.nonce
                );
                return Err(BlockchainError::Cancelled(format!(
                    "mining of block {} was superseded",
                    self.block.number
                )));
            }

            self.block.nonce += 1;
            self.block.timestamp = current_timestamp()?;
            self.block.difficulty =
                self.policy
                    .next_difficulty(self.base_difficulty, self.parent, self.block.timestamp);
            self.block.seal(self.encoding)?;

            if meets_difficulty(&self.block.binary, self.block.difficulty) {
                info!(
                    "Proof-of-work completed for block {}: {} (nonce {}, difficulty {})",
                    self.block.number, self.block.hash, self.block.nonce, self.block.difficulty
                );
                return Ok(self.block);
            }
        }

        Err(BlockchainError::Mining(format!(
            "nonce space exhausted for block {}",
            self.block.number
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FixedDifficulty, MineRateAdjustment, TransactionService};
    use std::cell::Cell;

    fn candidate(parent: &Block) -> Block {
        Block {
            number: parent.number + 1,
            parent_hash: parent.hash.clone(),
            miner: "0xMiner".to_string(),
            transactions: vec![TransactionService::default().reward_transaction("0xMiner")],
            ..Block::default()
        }
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("0001", 3));
        assert!(!meets_difficulty("0001", 4));
        assert!(meets_difficulty("1", 0));
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn test_mined_block_meets_target() {
        let encoding = HashEncoding::default();
        let parent = Block::genesis(0, 6, encoding).unwrap();
        let pow = ProofOfWork::new_proof_of_work(
            candidate(&parent),
            &parent,
            &FixedDifficulty,
            6,
            encoding,
        );

        let block = pow.run(&|| false).unwrap();
        assert_eq!(block.difficulty, 6);
        assert!(block.binary.starts_with("000000"));
        assert!(block.nonce >= 1);
        assert!(ProofOfWork::validate(&block, encoding));
    }

    #[test]
    fn test_validate_rejects_tampered_block() {
        let encoding = HashEncoding::default();
        let parent = Block::genesis(0, 4, encoding).unwrap();
        let mut block = ProofOfWork::new_proof_of_work(
            candidate(&parent),
            &parent,
            &FixedDifficulty,
            4,
            encoding,
        )
        .run(&|| false)
        .unwrap();

        block.data = "tampered".to_string();
        assert!(!ProofOfWork::validate(&block, encoding));
    }

    #[test]
    fn test_cancelled_before_start() {
        let encoding = HashEncoding::default();
        let parent = Block::genesis(0, 200, encoding).unwrap();
        let token = CancelToken::new();
        token.cancel();

        let pow = ProofOfWork::new_proof_of_work(
            candidate(&parent),
            &parent,
            &FixedDifficulty,
            200,
            encoding,
        );
        let result = pow.run(&|| token.is_cancelled());
        assert!(matches!(result, Err(BlockchainError::Cancelled(_))));
    }

    #[test]
    fn test_cancelled_mid_search() {
        let encoding = HashEncoding::default();
        let parent = Block::genesis(0, 200, encoding).unwrap();
        let polls = Cell::new(0);

        let pow = ProofOfWork::new_proof_of_work(
            candidate(&parent),
            &parent,
            &FixedDifficulty,
            200,
            encoding,
        );
        let result = pow.run(&|| {
            polls.set(polls.get() + 1);
            polls.get() > 50
        });
        assert!(matches!(result, Err(BlockchainError::Cancelled(_))));
        assert_eq!(polls.get(), 51);
    }

    #[test]
    fn test_policy_sets_block_difficulty() {
        let encoding = HashEncoding::default();
        // parent mined "now", so the next block is fast and difficulty goes up
        let mut parent = Block::genesis(0, 2, encoding).unwrap();
        parent.timestamp = current_timestamp().unwrap();
        let policy = MineRateAdjustment::new(3600);

        let block =
            ProofOfWork::new_proof_of_work(candidate(&parent), &parent, &policy, 99, encoding)
                .run(&|| false)
                .unwrap();
        assert_eq!(block.difficulty, 3);
        assert!(meets_difficulty(&block.binary, 3));
    }
}
