// Pre-image construction for transaction and block hashes.
//
// `Concatenated` is the historical wire format: fields glued together with no
// delimiters, integers in decimal, and the block nonce written as a single
// Unicode code point. It is not injective ("ab" + "c" == "a" + "bc").
// `LengthPrefixed` writes every field as an 8-byte big-endian length followed
// by its bytes, which removes the ambiguity.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BlockchainError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashEncoding {
    Concatenated,
    #[default]
    LengthPrefixed,
}

impl std::str::FromStr for HashEncoding {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "concatenated" => Ok(HashEncoding::Concatenated),
            "lengthprefixed" | "length-prefixed" | "length_prefixed" => {
                Ok(HashEncoding::LengthPrefixed)
            }
            _ => Err(BlockchainError::Config(format!(
                "Invalid hash encoding: {s}. Valid options: Concatenated, LengthPrefixed"
            ))),
        }
    }
}

pub struct Preimage {
    encoding: HashEncoding,
    bytes: Vec<u8>,
}

impl Preimage {
    pub fn new(encoding: HashEncoding) -> Preimage {
        Preimage {
            encoding,
            bytes: Vec::new(),
        }
    }

    pub fn push_str(&mut self, value: &str) -> &mut Self {
        self.push_bytes(value.as_bytes())
    }

    pub fn push_int(&mut self, value: i64) -> &mut Self {
        self.push_str(&value.to_string())
    }

    /// Historical blocks hash the nonce as one code point (truncated to 32
    /// bits, U+FFFD when it is not a valid scalar value).
    pub fn push_nonce(&mut self, nonce: i64) -> &mut Self {
        match self.encoding {
            HashEncoding::Concatenated => {
                let mut buf = [0u8; 4];
                let encoded = nonce_char(nonce).encode_utf8(&mut buf);
                self.bytes.extend_from_slice(encoded.as_bytes());
                self
            }
            HashEncoding::LengthPrefixed => self.push_int(nonce),
        }
    }

    fn push_bytes(&mut self, value: &[u8]) -> &mut Self {
        if self.encoding == HashEncoding::LengthPrefixed {
            self.bytes
                .extend_from_slice(&(value.len() as u64).to_be_bytes());
        }
        self.bytes.extend_from_slice(value);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

fn nonce_char(nonce: i64) -> char {
    let truncated = nonce as i32;
    u32::try_from(truncated)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

pub fn from_json<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))
}
