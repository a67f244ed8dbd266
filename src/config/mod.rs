//! Configuration management
//!
//! Node settings come from built-in defaults, an optional TOML file and
//! `LEDGER_*` environment variables, in that order.

pub mod settings;

pub use settings::Config;
