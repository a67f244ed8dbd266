//! Utility functions and helpers
//!
//! Hashing, signatures, key derivation and the hash pre-image encoding used
//! throughout the engine.

pub mod crypto;
pub mod encoding;
pub mod keys;

pub use crypto::{
    crypto_hash, current_timestamp, decode_hex, encode_hex_prefixed, hash, hash_named,
    hex_to_binary, sign, verify_signature, Digest, HashAlgorithm,
};
pub use encoding::{from_json, to_json, HashEncoding, Preimage};
pub use keys::{
    generate_key_pair, key_pair_from_private_key, mnemonic_to_seed, to_checksum_address, KeyPair,
};
