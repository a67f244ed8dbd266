use crate::core::DifficultyMode;
use crate::error::{BlockchainError, Result};
use crate::storage::PoolSource;
use crate::utils::HashEncoding;
use log::info;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "LEDGER_";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_INITIAL_DIFFICULTY: i64 = 10;
const DEFAULT_MINE_RATE_SECS: i64 = 10;
const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Node settings. Built once at startup and handed to the services that need
/// them; there is no process-wide instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub initial_difficulty: i64,
    pub genesis_nonce: i64,
    pub pool_source: PoolSource,
    pub difficulty_policy: DifficultyMode,
    pub mine_rate_secs: i64,
    pub hash_encoding: HashEncoding,
    pub store_retry_attempts: u32,
    pub store_retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            initial_difficulty: DEFAULT_INITIAL_DIFFICULTY,
            genesis_nonce: 0,
            pool_source: PoolSource::Mempool,
            difficulty_policy: DifficultyMode::Fixed,
            mine_rate_secs: DEFAULT_MINE_RATE_SECS,
            hash_encoding: HashEncoding::LengthPrefixed,
            store_retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            store_retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file when given, then `LEDGER_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `LEDGER_*` overrides from any key/value source.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "DATA_DIR" => self.data_dir = PathBuf::from(value),
                "INITIAL_DIFFICULTY" => self.initial_difficulty = parse_number(&key, &value)?,
                "GENESIS_NONCE" => self.genesis_nonce = parse_number(&key, &value)?,
                "POOL_SOURCE" => self.pool_source = value.parse()?,
                "DIFFICULTY_POLICY" => self.difficulty_policy = value.parse()?,
                "MINE_RATE_SECS" => self.mine_rate_secs = parse_number(&key, &value)?,
                "HASH_ENCODING" => self.hash_encoding = value.parse()?,
                "STORE_RETRY_ATTEMPTS" => {
                    self.store_retry_attempts = parse_number(&key, &value)?
                }
                "STORE_RETRY_BACKOFF_MS" => {
                    self.store_retry_backoff_ms = parse_number(&key, &value)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_difficulty <= 0 {
            return Err(BlockchainError::Config(
                "initial_difficulty must be greater than 0".to_string(),
            ));
        }
        if self.mine_rate_secs <= 0 {
            return Err(BlockchainError::Config(
                "mine_rate_secs must be greater than 0".to_string(),
            ));
        }
        if self.store_retry_attempts == 0 {
            return Err(BlockchainError::Config(
                "store_retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.store_retry_backoff_ms)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| BlockchainError::Config(format!("{key} is not a valid number: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.initial_difficulty, 10);
        assert_eq!(config.pool_source, PoolSource::Mempool);
        assert_eq!(config.difficulty_policy, DifficultyMode::Fixed);
        assert_eq!(config.hash_encoding, HashEncoding::LengthPrefixed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_with_partial_fields() {
        let config = Config::from_toml(
            r#"
            initial_difficulty = 4
            pool_source = "Store"
            difficulty_policy = "MineRate"
            hash_encoding = "Concatenated"
            "#,
        )
        .unwrap();

        assert_eq!(config.initial_difficulty, 4);
        assert_eq!(config.pool_source, PoolSource::Store);
        assert_eq!(config.difficulty_policy, DifficultyMode::MineRate);
        assert_eq!(config.hash_encoding, HashEncoding::Concatenated);
        assert_eq!(config.mine_rate_secs, DEFAULT_MINE_RATE_SECS);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(&path, "genesis_nonce = 7\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.genesis_nonce, 7);
        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(vars(&[
                ("LEDGER_INITIAL_DIFFICULTY", "3"),
                ("LEDGER_POOL_SOURCE", "store"),
                ("LEDGER_DATA_DIR", "/tmp/ledger"),
                ("UNRELATED", "ignored"),
            ]))
            .unwrap();

        assert_eq!(config.initial_difficulty, 3);
        assert_eq!(config.pool_source, PoolSource::Store);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger"));
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(vars(&[("LEDGER_INITIAL_DIFFICULTY", "ten")]));
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_non_positive_difficulty() {
        let config = Config {
            initial_difficulty: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
