//! Error types for the ledger

use std::fmt;

/// Reasons a full-chain validation can fail. Each variant names the pass that
/// rejected the chain and where.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityViolation {
    #[error("block {index} does not link to the hash of its predecessor")]
    BrokenHashLink { index: u64 },
    #[error("block {index} stored hash {stored} does not match recomputed hash {computed}")]
    StaleBlockHash {
        index: u64,
        stored: String,
        computed: String,
    },
    #[error("block {index} was sealed without a hash target")]
    MissingHashTarget { index: u64 },
    #[error("block {index} hash is not below its hash target")]
    HashAboveTarget { index: u64 },
    #[error("account {account} goes negative in block {index} ({balance})")]
    NegativeBalance {
        index: u64,
        account: String,
        balance: i64,
    },
}

#[derive(Debug, Clone)]
pub enum ChainError {
    SignatureInvalid(String),
    UnderfundedTransaction(String),
    UnknownAccount(String),
    ChainIntegrityViolation(IntegrityViolation),
    ProofOfWorkExhaustion { attempts: u64 },
    InvalidTransaction(String),
    InvalidHashTarget(String),
    InvalidBlock(String),
    DuplicateAccount(String),
    CryptoError(String),
    ConfigError(String),
    SerializationError(String),
    IoError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::SignatureInvalid(msg) => write!(f, "Invalid signature: {}", msg),
            ChainError::UnderfundedTransaction(msg) => {
                write!(f, "Underfunded transaction: {}", msg)
            }
            ChainError::UnknownAccount(id) => write!(f, "Unknown account: {}", id),
            ChainError::ChainIntegrityViolation(v) => {
                write!(f, "Chain integrity violation: {}", v)
            }
            ChainError::ProofOfWorkExhaustion { attempts } => write!(
                f,
                "Proof of work exhausted after {} attempts without meeting the target",
                attempts
            ),
            ChainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {}", msg),
            ChainError::InvalidHashTarget(msg) => write!(f, "Invalid hash target: {}", msg),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::DuplicateAccount(id) => write!(f, "Account already registered: {}", id),
            ChainError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<IntegrityViolation> for ChainError {
    fn from(violation: IntegrityViolation) -> Self {
        ChainError::ChainIntegrityViolation(violation)
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
