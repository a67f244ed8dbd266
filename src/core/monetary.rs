// Monetary constants for the ledger

/// Amount paid to the miner by the single reward transaction in a block
pub const MINERS_REWARD: i64 = 50;

/// Sender of reward transactions. Not a real account.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub fn is_zero_address(address: &str) -> bool {
    address == ZERO_ADDRESS
}
