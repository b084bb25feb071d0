//! pow-ledger - a single-process ledger of signed transfers sealed into
//! proof-of-work blocks
//!
//! # Architecture
//!
//! Writes flow one way: an [`account::Account`] signs a
//! [`transaction::Transaction`], the [`blockchain::Blockchain`] admits it into
//! its pending pool, and sealing settles the pool into a mined block.
//! Validation replays the chain from genesis without touching it.
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, settlement and full-chain validation
//! - [`transaction`] - Transaction types and admission checks
//! - [`account`] - Accounts, balances and nonces
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work mining
//!
//! ## Cryptography
//! - [`crypto`] - RSA-PSS signatures and SHA-256 digests
//! - [`canonical`] - Canonical JSON for hashing and signing
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`logging`] - Tracing setup
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod account;
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod canonical;
pub mod crypto;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod logging;

#[cfg(test)]
pub(crate) mod test_utils;
