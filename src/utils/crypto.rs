// Hashing, signing and the hex helpers the whole engine leans on.
// Keccak-256 is the canonical hash; SHA-256/512 come from ring and are only
// exposed through `hash` for API callers.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ring::digest::{digest, SHA256, SHA512};
use sha3::{Digest as Sha3Digest, Keccak256};

use crate::error::{BlockchainError, Result};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a signature once the recovery id is dropped (r || s)
pub const SIGNATURE_CORE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Keccak256,
}

impl FromStr for HashAlgorithm {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            "Keccak256" => Ok(HashAlgorithm::Keccak256),
            _ => Err(BlockchainError::Validation(format!(
                "Unknown hash algorithm: {s}. Valid options: SHA256, SHA512, Keccak256"
            ))),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "SHA256"),
            HashAlgorithm::Sha512 => write!(f, "SHA512"),
            HashAlgorithm::Keccak256 => write!(f, "Keccak256"),
        }
    }
}

/// A 32-byte Keccak-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        encode_hex_prefixed(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn hash(data: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha256 => digest(&SHA256, data).as_ref().to_vec(),
        HashAlgorithm::Sha512 => digest(&SHA512, data).as_ref().to_vec(),
        HashAlgorithm::Keccak256 => crypto_hash(data).as_bytes().to_vec(),
    }
}

/// Hash with an algorithm named by the caller, e.g. from a request body.
pub fn hash_named(data: &[u8], algorithm: &str) -> Result<Vec<u8>> {
    let algorithm = HashAlgorithm::from_str(algorithm)?;
    Ok(hash(data, algorithm))
}

pub fn crypto_hash(data: &[u8]) -> Digest {
    let out = Keccak256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(out.as_slice());
    Digest(bytes)
}

pub fn encode_hex_prefixed(data: &[u8]) -> String {
    format!("0x{}", HEXLOWER.encode(data))
}

/// Decode hex with or without a `0x` prefix; either letter case is accepted.
pub fn decode_hex(data: &str) -> Result<Vec<u8>> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    HEXLOWER_PERMISSIVE
        .decode(stripped.as_bytes())
        .map_err(|e| BlockchainError::Crypto(format!("Invalid hex string: {e}")))
}

/// Each byte becomes eight zero-padded binary digits, concatenated in order.
pub fn hex_to_binary(hex: &str) -> Result<String> {
    let bytes = decode_hex(hex)?;
    let mut binary = String::with_capacity(bytes.len() * 8);
    for byte in bytes {
        binary.push_str(&format!("{byte:08b}"));
    }
    Ok(binary)
}

/// Sign a prehashed digest with a hex private key.
/// Output is `0x` hex of r || s || recovery id.
pub fn sign(digest: &[u8], private_key: &str) -> Result<String> {
    let key_bytes = decode_hex(private_key)?;
    let signing_key = SigningKey::from_slice(&key_bytes)
        .map_err(|e| BlockchainError::Crypto(format!("Invalid private key: {e}")))?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(digest)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign digest: {e}")))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte());
    Ok(encode_hex_prefixed(&bytes))
}

/// Check a signature against an uncompressed public key with its `04` prefix
/// stripped. Any decoding failure is reported as `false`.
pub fn verify_signature(public_key: &str, digest: &[u8], signature: &str) -> bool {
    let public_key = public_key.strip_prefix("0x").unwrap_or(public_key);
    let public_key_bytes = match decode_hex(&format!("04{public_key}")) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature_bytes = match decode_hex(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if signature_bytes.len() < SIGNATURE_CORE_LEN {
        return false;
    }

    let verifying_key = match VerifyingKey::from_sec1_bytes(&public_key_bytes) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = match Signature::from_slice(&signature_bytes[..SIGNATURE_CORE_LEN]) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    verifying_key.verify_prehash(digest, &signature).is_ok()
}

/// Unix time in seconds
pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_secs();

    i64::try_from(duration).map_err(|_| BlockchainError::Crypto("Timestamp overflow".to_string()))
}
