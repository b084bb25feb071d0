//! Shared fixtures for unit tests.

use crate::account::{Account, SharedAccount};
use crate::crypto::KeyPair;
use crate::transaction::Amount;
use once_cell::sync::Lazy;

const POOL_SIZE: usize = 4;

/// RSA key generation dominates test time, so a few 1024-bit keys are made
/// once and handed out by slot. Accounts in one test should use distinct slots.
static KEY_POOL: Lazy<Vec<KeyPair>> = Lazy::new(|| {
    (0..POOL_SIZE)
        .map(|_| KeyPair::generate_with_bits(1024).expect("test key generation"))
        .collect()
});

pub fn test_key(slot: usize) -> KeyPair {
    KEY_POOL[slot % POOL_SIZE].clone()
}

pub fn test_account(id: &str, balance: Amount, slot: usize) -> SharedAccount {
    Account::with_key_pair(id, balance, test_key(slot)).into_shared()
}

/// All-`f` target: any hash except the maximum one qualifies.
pub const EASY_TARGET: &str = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Roughly one in sixteen hashes qualifies.
pub const LIGHT_TARGET: &str = "1000000000000000000000000000000000000000000000000000000000000000";
