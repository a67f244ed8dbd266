use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use ring::pbkdf2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BlockchainError, Result};
use crate::utils::crypto::{crypto_hash, decode_hex};
use data_encoding::HEXLOWER;

const SEED_ITERATIONS: u32 = 2048;
const MNEMONIC_SALT: &str = "mnemonic";
const PRIVATE_KEY_SALT: &str = "Ethereum seed";
const ADDRESS_LEN: usize = 20;

/// Private key (hex, no prefix), public key (uncompressed, `04` stripped,
/// hex, no prefix) and checksummed `0x` address.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    private_key: String,
    public_key: String,
    address: String,
}

impl KeyPair {
    fn from_signing_key(signing_key: &SigningKey) -> KeyPair {
        let verifying_key = signing_key.verifying_key();
        let uncompressed = verifying_key.to_encoded_point(false);

        KeyPair {
            private_key: HEXLOWER.encode(&signing_key.to_bytes()),
            public_key: HEXLOWER.encode(&uncompressed.as_bytes()[1..]),
            address: public_key_to_address(verifying_key),
        }
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("address", &self.address)
            .finish()
    }
}

/// Random key pair for an empty seed phrase, otherwise a deterministic one.
pub fn generate_key_pair(seed_phrase: &str) -> Result<KeyPair> {
    let signing_key = if seed_phrase.is_empty() {
        SigningKey::random(&mut OsRng)
    } else {
        let mut seed = mnemonic_to_seed(seed_phrase, "");
        let mut scalar = [0u8; 32];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA512,
            iterations(),
            PRIVATE_KEY_SALT.as_bytes(),
            &seed,
            &mut scalar,
        );
        seed.zeroize();
        let key = SigningKey::from_slice(&scalar)
            .map_err(|e| BlockchainError::Crypto(format!("Failed to derive private key: {e}")));
        scalar.zeroize();
        key?
    };

    Ok(KeyPair::from_signing_key(&signing_key))
}

/// Import an account from a 32-byte hex private key (`0x` optional).
pub fn key_pair_from_private_key(private_key: &str) -> Result<KeyPair> {
    let mut bytes = decode_hex(private_key)?;
    if bytes.len() != 32 {
        bytes.zeroize();
        return Err(BlockchainError::Crypto(
            "Private key must be 32 bytes (64 hex characters)".to_string(),
        ));
    }
    let signing_key = SigningKey::from_slice(&bytes)
        .map_err(|e| BlockchainError::Crypto(format!("Invalid private key: {e}")));
    bytes.zeroize();
    Ok(KeyPair::from_signing_key(&signing_key?))
}

/// BIP-39 seed: PBKDF2-HMAC-SHA512 over the phrase with salt "mnemonic" plus
/// the passphrase. The phrase is taken as-is and not checked against a word list.
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> [u8; 64] {
    let salt = format!("{MNEMONIC_SALT}{passphrase}");
    let mut seed = [0u8; 64];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        iterations(),
        salt.as_bytes(),
        phrase.as_bytes(),
        &mut seed,
    );
    seed
}

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(SEED_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

/// Last 20 bytes of Keccak-256 over the 64-byte public key, EIP-55 checksummed.
pub fn public_key_to_address(public_key: &VerifyingKey) -> String {
    let uncompressed = public_key.to_encoded_point(false);
    let digest = crypto_hash(&uncompressed.as_bytes()[1..]);
    to_checksum_address(&digest.as_bytes()[32 - ADDRESS_LEN..])
}

pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = HEXLOWER.encode(address);
    let digest = crypto_hash(lower.as_bytes());
    let digest = digest.as_bytes();

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let byte = digest[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
