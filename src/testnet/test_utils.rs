//! Test utilities for ledger testing

use crate::config::Config;
use crate::core::{ChainService, Transaction, TransactionRequest, TransactionService};
use crate::network::PubSub;
use crate::storage::KeyValueStore;
use crate::utils::{decode_hex, sign, KeyPair};
use std::sync::Arc;

/// Low difficulty and no retry backoff so tests mine in milliseconds.
pub fn test_config() -> Config {
    Config {
        initial_difficulty: 4,
        store_retry_attempts: 1,
        store_retry_backoff_ms: 0,
        ..Config::default()
    }
}

pub fn chain_service(store: Arc<dyn KeyValueStore>, pubsub: Arc<dyn PubSub>) -> ChainService {
    ChainService::load(&test_config(), store, pubsub).unwrap()
}

/// A transfer request from `key_pair`, signed over its hash.
pub fn signed_request(
    key_pair: &KeyPair,
    to: &str,
    value: i64,
    data: &str,
    timestamp: i64,
) -> TransactionRequest {
    let unsigned = Transaction {
        from: key_pair.address().to_string(),
        to: to.to_string(),
        value,
        data: data.to_string(),
        timestamp,
        ..Transaction::default()
    };
    let hash = TransactionService::new(test_config().hash_encoding).tx_hash(&unsigned);
    let signature = sign(&decode_hex(&hash).unwrap(), key_pair.private_key()).unwrap();

    TransactionRequest {
        from: unsigned.from,
        to: unsigned.to,
        value,
        data: unsigned.data,
        timestamp,
        signature,
        public_key: key_pair.public_key().to_string(),
    }
}
