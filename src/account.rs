//! Accounts: identity, balance, transaction nonce and signing keys

use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::transaction::{Amount, Transaction, TransactionMessage};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Starting balance when none is given.
pub const DEFAULT_BALANCE: Amount = 100;

/// An account shared between the ledger's registry and its external holder.
/// Both sides observe the same balance and nonce.
///
/// The lock is not reentrant. Ledger calls lock the sender themselves, so
/// release any guard before passing its transaction on:
///
/// ```ignore
/// let tx = account.write().create_transaction("bob", 10, "")?;
/// ledger.add_transaction(tx);
/// ```
pub type SharedAccount = Arc<RwLock<Account>>;

#[derive(Debug)]
pub struct Account {
    id: String,
    balance: Amount,
    initial_balance: Amount,
    nonce: u64,
    key_pair: KeyPair,
}

impl Account {
    /// Creates an account with a freshly generated key pair of `key_bits`.
    pub fn new(id: &str, balance: Amount, key_bits: usize) -> Result<Self, ChainError> {
        Ok(Self::with_key_pair(id, balance, KeyPair::generate_with_bits(key_bits)?))
    }

    pub fn with_key_pair(id: &str, balance: Amount, key_pair: KeyPair) -> Self {
        Account {
            id: id.to_string(),
            balance,
            initial_balance: balance,
            nonce: 0,
            key_pair,
        }
    }

    pub fn into_shared(self) -> SharedAccount {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Balance at creation; only full-history validation reads it.
    pub fn initial_balance(&self) -> Amount {
        self.initial_balance
    }

    /// Nonce of the most recently created transaction (0 before the first).
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// PEM SubjectPublicKeyInfo of the account key.
    pub fn public_key(&self) -> &str {
        self.key_pair.public_key_pem()
    }

    /// Builds and signs a transfer using the next nonce. The nonce is
    /// consumed as soon as the transaction exists, whether or not the ledger
    /// later admits or settles it.
    pub fn create_transaction(
        &mut self,
        receiver_id: &str,
        value: Amount,
        tx_metadata: &str,
    ) -> Result<Transaction, ChainError> {
        let nonce = self.nonce + 1;
        let message = TransactionMessage::new(&self.id, receiver_id, value, tx_metadata, nonce);
        let digest = message.digest()?;
        let signature = self.key_pair.sign(&digest)?;

        self.nonce = nonce;
        debug!(account = %self.id, nonce, receiver = receiver_id, value, "created transaction");
        Ok(Transaction::from_parts(message, signature))
    }

    /// Adds a settled amount. Only block sealing moves balances.
    pub(crate) fn credit(&mut self, value: Amount) {
        self.balance += value;
    }

    pub(crate) fn debit(&mut self, value: Amount) {
        self.balance -= value;
    }
}
