//! Cloak Gateway
//!
//! Capabilities the lifecycle controller calls out to. None of them are
//! implemented here; production deployments bind them to a chain RPC, an
//! encryption SDK and a decryption relayer, while `cloak-devnet` provides
//! in-process stand-ins.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Lifecycle Controller                       │
//! └──────┬───────────────────────┬───────────────────────┬──────────┘
//!        │ encrypt               │ reads / writes        │ verify_decryption
//!        ▼                       ▼                       ▼
//! ┌──────────────┐      ┌─────────────────┐      ┌──────────────────┐
//! │  Encryption  │      │  Ledger Gateway │◀─────│  Decryption /    │
//! │   Service    │      │                 │ proof│  Verification    │
//! └──────────────┘      └─────────────────┘submit└──────────────────┘
//! ```

pub mod error;
pub mod services;
pub mod types;

pub use error::GatewayError;
pub use services::{DecryptionVerifier, EncryptionService, LedgerGateway, ProofSubmitter};
pub use types::{
    CiphertextHandle, ContractAddress, DecryptionProof, EncryptedInput, NewRecord, TxHash,
    TxReceipt, VerifiedDecryption,
};
