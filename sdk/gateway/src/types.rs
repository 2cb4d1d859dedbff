//! Payload types exchanged with external services

use std::collections::HashMap;
use std::fmt;

use cloak_record::RecordId;
use serde::{Deserialize, Serialize};

/// Address of the request contract; the target context for encryption and decryption.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque on-chain locator of a stored ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Output of the encryption service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub ciphertext: Vec<u8>,
    /// Proves the ciphertext is well-formed and bound to context and requester
    pub proof: Vec<u8>,
}

/// Arguments of the record creation write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub id: RecordId,
    pub title: String,
    pub ciphertext: Vec<u8>,
    pub input_proof: Vec<u8>,
    pub category: u8,
    pub secondary: u32,
    /// Fixed description label stored with the record
    pub purpose: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Proof of block inclusion for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block: u64,
}

/// Decryption proof produced alongside the cleartext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof(pub Vec<u8>);

/// Result of a decrypt-and-submit exchange.
///
/// Only exists once the proof has been accepted by the ledger: the
/// receipt is the one returned by the [`ProofSubmitter`](crate::ProofSubmitter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDecryption {
    pub clear_values: HashMap<CiphertextHandle, u64>,
    pub receipt: TxReceipt,
}

impl VerifiedDecryption {
    pub fn value_for(&self, handle: &CiphertextHandle) -> Option<u64> {
        self.clear_values.get(handle).copied()
    }
}
