//! Service traits

use async_trait::async_trait;
use cloak_record::{Address, Record, RecordId};

use crate::error::GatewayError;
use crate::types::{
    CiphertextHandle, ContractAddress, DecryptionProof, EncryptedInput, NewRecord, TxHash,
    TxReceipt, VerifiedDecryption,
};

// ============================================================================
// Ledger
// ============================================================================

/// Authoritative record store
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// All record ids, in ledger order
    async fn enumerate_ids(&self) -> Result<Vec<RecordId>, GatewayError>;

    async fn get_record(&self, id: &RecordId) -> Result<Record, GatewayError>;

    async fn get_ciphertext_handle(&self, id: &RecordId) -> Result<CiphertextHandle, GatewayError>;

    /// Health probe
    async fn is_available(&self) -> Result<bool, GatewayError>;

    /// Broadcast a record creation signed by `signer`.
    ///
    /// Returns once the write is accepted for broadcast; inclusion is
    /// awaited separately with [`LedgerGateway::wait_for_inclusion`].
    async fn create_record(&self, signer: &Address, record: NewRecord)
    -> Result<TxHash, GatewayError>;

    /// Broadcast a decryption proof for `id`.
    ///
    /// Rejects with [`GatewayError::AlreadyVerified`] if the record is
    /// already verified.
    async fn submit_verification(
        &self,
        signer: &Address,
        id: &RecordId,
        encoded_cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> Result<TxHash, GatewayError>;

    /// Suspend until `tx` is included in a block
    async fn wait_for_inclusion(&self, tx: &TxHash) -> Result<TxReceipt, GatewayError>;
}

// ============================================================================
// Encryption
// ============================================================================

#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// One-time per-session setup; must succeed before [`EncryptionService::encrypt`].
    async fn initialize(&self) -> Result<(), GatewayError>;

    fn is_initialized(&self) -> bool;

    /// Encrypt `value` for `context` on behalf of `requester`
    async fn encrypt(
        &self,
        context: &ContractAddress,
        requester: &Address,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError>;
}

// ============================================================================
// Decryption / Verification
// ============================================================================

/// Callback through which a decryption service lands its proof on the ledger
#[async_trait]
pub trait ProofSubmitter: Send + Sync {
    /// Submit `(encoded_cleartext, proof)` and wait for inclusion
    async fn submit(
        &self,
        encoded_cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> Result<TxReceipt, GatewayError>;
}

#[async_trait]
pub trait DecryptionVerifier: Send + Sync {
    /// Decrypt `handles`, prove the result and submit it through `submitter`.
    ///
    /// The proof is handed to `submitter` inside this call and never returned
    /// on its own. Errors from `submitter` must be propagated unchanged so
    /// callers can tell a lost verification race from a real failure.
    async fn verify_decryption(
        &self,
        handles: &[CiphertextHandle],
        context: &ContractAddress,
        submitter: &dyn ProofSubmitter,
    ) -> Result<VerifiedDecryption, GatewayError>;
}
