//! Transaction types for the ledger

use crate::canonical::to_canonical_vec;
use crate::crypto::sha256_hex;
use crate::error::ChainError;
use serde::{Deserialize, Serialize};

/// Balances and transfer values.
pub type Amount = i64;

/// The signed part of a transaction. The field set is fixed: the signature
/// covers exactly these five keys in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMessage {
    pub sender: String,
    pub receiver: String,
    pub value: Amount,
    pub tx_metadata: String,
    pub nonce: u64,
}

impl TransactionMessage {
    pub fn new(sender: &str, receiver: &str, value: Amount, tx_metadata: &str, nonce: u64) -> Self {
        TransactionMessage {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            value,
            tx_metadata: tx_metadata.to_string(),
            nonce,
        }
    }

    /// Canonical (sorted-key) serialization of the message.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, ChainError> {
        to_canonical_vec(self)
    }

    /// Hex SHA-256 of the canonical serialization; this is what gets signed.
    pub fn digest(&self) -> Result<String, ChainError> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }
}

/// A message plus the sender's signature over its digest. Immutable once
/// built; a correction is a new transaction with a new nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    message: TransactionMessage,
    #[serde(with = "signature_base64")]
    signature: Vec<u8>,
}

impl Transaction {
    /// Pairs a message with a signature without checking it. Admission is
    /// where signatures are verified.
    pub fn from_parts(message: TransactionMessage, signature: Vec<u8>) -> Self {
        Transaction { message, signature }
    }

    pub fn message(&self) -> &TransactionMessage {
        &self.message
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn signature_base64(&self) -> String {
        signature_base64::encode(&self.signature)
    }

    pub fn sender(&self) -> &str {
        &self.message.sender
    }

    pub fn receiver(&self) -> &str {
        &self.message.receiver
    }

    pub fn value(&self) -> Amount {
        self.message.value
    }

    pub fn nonce(&self) -> u64 {
        self.message.nonce
    }

    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Signatures cross serialization boundaries as standard base64 text.
mod signature_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}
