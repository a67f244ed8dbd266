//! Wallet and account operations
//!
//! Key pair generation and import, transaction signing, and balances
//! computed from the mined chain.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::{sign_hash, verify, WalletService};
