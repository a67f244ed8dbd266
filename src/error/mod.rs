//! Error handling for the ledger node
//!
//! Every failure in the engine is returned as a `BlockchainError`. Nothing in
//! the library terminates the process: a bad peer message or a malformed
//! transaction comes back to the caller as an ordinary error value.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error kinds surfaced by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Malformed or invalid input (transaction, difficulty, hash algorithm)
    Validation(String),
    /// Unknown block number or transaction hash
    NotFound(String),
    /// Candidate chain rejected; `block_number` is the first offending block
    /// or the candidate length when it is simply not longer
    Consensus { message: String, block_number: i64 },
    /// Bad hex, malformed signature, key derivation failure
    Crypto(String),
    /// Embedded database errors
    Database(String),
    /// External key-value store errors (transient, retried)
    Storage(String),
    /// Publish/subscribe transport errors (transient, retried)
    Network(String),
    /// JSON encoding/decoding errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
    /// Mining precondition errors
    Mining(String),
    /// An in-flight proof-of-work search was aborted
    Cancelled(String),
}

impl BlockchainError {
    pub fn consensus(message: impl Into<String>, block_number: i64) -> Self {
        BlockchainError::Consensus {
            message: message.into(),
            block_number,
        }
    }

    /// Errors caused by the caller's input rather than by the node itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BlockchainError::Validation(_)
                | BlockchainError::NotFound(_)
                | BlockchainError::Consensus { .. }
                | BlockchainError::Crypto(_)
                | BlockchainError::Mining(_)
        )
    }

    /// Errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BlockchainError::Storage(_) | BlockchainError::Network(_) | BlockchainError::Database(_)
        )
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Validation(msg) => write!(f, "Validation error: {msg}"),
            BlockchainError::NotFound(msg) => write!(f, "Not found: {msg}"),
            BlockchainError::Consensus {
                message,
                block_number,
            } => write!(f, "Consensus error at block {block_number}: {message}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Storage(msg) => write!(f, "Storage error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
            BlockchainError::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}
