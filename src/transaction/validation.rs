//! Checks applied to transactions at admission

use crate::crypto::verify_signature;
use crate::error::ChainError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Recomputes the message digest and checks the signature against the
    /// given PEM public key.
    pub fn verify_with_key(&self, public_key_pem: &str) -> Result<(), ChainError> {
        let digest = self.message().digest()?;
        verify_signature(public_key_pem, &digest, self.signature())
    }

    /// Transfers must move a positive amount.
    pub fn validate_value(&self) -> Result<(), ChainError> {
        if self.value() <= 0 {
            return Err(ChainError::InvalidTransaction(format!(
                "Transfer value must be positive, got {}",
                self.value()
            )));
        }
        Ok(())
    }
}
