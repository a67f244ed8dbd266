//! Shared fixtures for unit tests
//!
//! Low-difficulty configuration, in-memory store and broker wiring, and
//! signed transaction requests.

pub mod test_utils;

pub use test_utils::*;
