// Account-model transactions: a signed transfer of `value` from one address to
// another. The hash commits to from, to, value, data and timestamp; the
// signature is made over the raw hash bytes.

use crate::core::monetary::{is_zero_address, MINERS_REWARD, ZERO_ADDRESS};
use crate::error::{BlockchainError, Result};
use crate::utils::{crypto_hash, decode_hex, verify_signature, HashEncoding, Preimage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub signature: String,
    pub from: String,
    pub to: String,
    pub value: i64,
    pub data: String,
    pub timestamp: i64,
}

impl Transaction {
    pub fn is_reward(&self) -> bool {
        is_zero_address(&self.from)
    }
}

/// Everything a client submits for a new transfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    pub value: i64,
    pub data: String,
    pub timestamp: i64,
    pub signature: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionService {
    encoding: HashEncoding,
}

impl TransactionService {
    pub fn new(encoding: HashEncoding) -> TransactionService {
        TransactionService { encoding }
    }

    pub fn encoding(&self) -> HashEncoding {
        self.encoding
    }

    /// Keccak-256 over from, to, value, data, timestamp as `0x` hex.
    pub fn tx_hash(&self, transaction: &Transaction) -> String {
        let preimage = Preimage::new(self.encoding)
            .push_str(&transaction.from)
            .push_str(&transaction.to)
            .push_int(transaction.value)
            .push_str(&transaction.data)
            .push_int(transaction.timestamp)
            .finish();
        crypto_hash(&preimage).to_hex()
    }

    pub fn valid_transaction(&self, transaction: &Transaction, public_key: &str) -> bool {
        self.check_transaction(transaction, public_key).is_ok()
    }

    /// Same rules as `valid_transaction`, with the reason on failure.
    pub fn check_transaction(&self, transaction: &Transaction, public_key: &str) -> Result<()> {
        if transaction.is_reward() {
            return Ok(());
        }

        if transaction.from.is_empty() {
            return Err(invalid("sender address is empty"));
        }
        if transaction.to.is_empty() {
            return Err(invalid("recipient address is empty"));
        }
        if transaction.value <= 0 {
            return Err(invalid("value must be greater than 0"));
        }
        if transaction.data.is_empty() {
            return Err(invalid("data is empty"));
        }
        if transaction.timestamp <= 0 {
            return Err(invalid("timestamp must be greater than 0"));
        }
        if transaction.hash != self.tx_hash(transaction) {
            return Err(invalid("hash does not match transaction fields"));
        }

        let hash_bytes = decode_hex(&transaction.hash)
            .map_err(|_| invalid("hash is not valid hex"))?;
        if !verify_signature(public_key, &hash_bytes, &transaction.signature) {
            return Err(invalid("signature verification failed"));
        }

        Ok(())
    }

    /// Miner payout. Timestamp and data are fixed so the hash only depends on
    /// the miner address.
    pub fn reward_transaction(&self, miner: &str) -> Transaction {
        let mut transaction = Transaction {
            hash: String::new(),
            signature: String::new(),
            from: ZERO_ADDRESS.to_string(),
            to: miner.to_string(),
            value: MINERS_REWARD,
            data: String::new(),
            timestamp: 0,
        };
        transaction.hash = self.tx_hash(&transaction);
        transaction
    }

    pub fn create_transaction(&self, request: &TransactionRequest) -> Result<Transaction> {
        let mut transaction = Transaction {
            hash: String::new(),
            signature: request.signature.clone(),
            from: request.from.clone(),
            to: request.to.clone(),
            value: request.value,
            data: request.data.clone(),
            timestamp: request.timestamp,
        };
        transaction.hash = self.tx_hash(&transaction);

        self.check_transaction(&transaction, &request.public_key)?;
        Ok(transaction)
    }
}

fn invalid(reason: &str) -> BlockchainError {
    BlockchainError::Validation(format!("Invalid transaction: {reason}"))
}
