//! Configuration management for the ledger

use crate::blockchain::HashTarget;
use crate::crypto::{DEFAULT_KEY_BITS, MIN_KEY_BITS};
use crate::error::ChainError;
use crate::miner::MiningStrategy;
use crate::transaction::Amount;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub ledger: ChainConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Hex difficulty target applied to newly sealed blocks.
    #[serde(default = "default_hash_target")]
    pub hash_target: String,
    /// Balance given to accounts opened without an explicit one.
    #[serde(default = "default_balance")]
    pub default_balance: Amount,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            hash_target: default_hash_target(),
            default_balance: default_balance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            key_bits: default_key_bits(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MiningConfig {
    #[serde(default)]
    pub strategy: MiningStrategy,
    /// Worker threads for parallel mining; the global pool when unset.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Give up after this many nonces; unbounded when unset.
    #[serde(default)]
    pub max_attempts: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ChainError> {
        let config: LedgerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot: the target must parse and keys must be
    /// large enough for PSS with SHA-256.
    pub fn validate(&self) -> Result<(), ChainError> {
        self.ledger.hash_target.parse::<HashTarget>()?;

        if self.crypto.key_bits < MIN_KEY_BITS {
            return Err(ChainError::ConfigError(format!(
                "crypto.key_bits must be at least {}, got {}",
                MIN_KEY_BITS, self.crypto.key_bits
            )));
        }
        if self.ledger.default_balance < 0 {
            return Err(ChainError::ConfigError(
                "ledger.default_balance cannot be negative".to_string(),
            ));
        }
        if self.mining.threads == Some(0) {
            return Err(ChainError::ConfigError(
                "mining.threads must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file. A missing file yields defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<LedgerConfig, ChainError> {
    match fs::read_to_string(path.as_ref()) {
        Ok(text) => LedgerConfig::from_toml_str(&text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(LedgerConfig::default()),
        Err(e) => Err(e.into()),
    }
}

fn default_hash_target() -> String {
    format!("0000{}", "f".repeat(60))
}

fn default_balance() -> Amount {
    crate::account::DEFAULT_BALANCE
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.ledger.hash_target.len(), 64);
        assert!(config.ledger.hash_target.starts_with("0000f"));
        assert_eq!(config.ledger.default_balance, 100);
        assert_eq!(config.crypto.key_bits, 2048);
        assert_eq!(config.mining.strategy, MiningStrategy::Sequential);
        assert_eq!(config.mining.max_attempts, None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [ledger]
            hash_target = "00ff"

            [mining]
            strategy = "parallel"
            threads = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger.hash_target, "00ff");
        assert_eq!(config.ledger.default_balance, 100);
        assert_eq!(config.mining.strategy, MiningStrategy::Parallel);
        assert_eq!(config.mining.threads, Some(2));
        assert_eq!(config.crypto.key_bits, 2048);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(LedgerConfig::from_toml_str("[ledger]\nhash_target = \"nope\"").is_err());
        assert!(LedgerConfig::from_toml_str("[crypto]\nkey_bits = 512").is_err());
        assert!(LedgerConfig::from_toml_str("[ledger]\ndefault_balance = -1").is_err());
        assert!(LedgerConfig::from_toml_str("[mining]\nthreads = 0").is_err());
        assert!(LedgerConfig::from_toml_str("[mining]\nstrategy = \"gpu\"").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\ndefault_balance = 250\n[logging]\nlevel = \"debug\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.ledger.default_balance, 250);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ledger.default_balance, 100);
    }
}
