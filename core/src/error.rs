//! Controller error types

use std::fmt;

use cloak_gateway::GatewayError;
use cloak_record::RecordId;
use thiserror::Error;

/// Why the ledger refused a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// User declined to sign
    Declined,
    /// Contract-level revert
    Reverted(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Declined => f.write_str("declined by user"),
            RejectReason::Reverted(reason) => write!(f, "reverted: {reason}"),
        }
    }
}

/// Errors returned by lifecycle operations.
///
/// None of them poison the controller; the next operation starts clean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("no identity connected")]
    Unauthenticated,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("ledger rejected the transaction ({0})")]
    LedgerRejected(RejectReason),

    #[error("timed out waiting for {0}")]
    LedgerTimeout(String),

    #[error("ledger unreachable: {0}")]
    LedgerUnreachable(String),

    /// Lost a verification race. Handled as success by the verify protocol.
    #[error("record already verified")]
    AlreadyVerified,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("unknown record: {0}")]
    UnknownRecord(RecordId),

    #[error("no unique record id after {0} attempts")]
    IdExhausted(u32),
}

impl ControllerError {
    /// Map a failure from a ledger read or write step
    pub fn from_ledger(err: GatewayError) -> Self {
        match err {
            GatewayError::Unreachable(msg) => ControllerError::LedgerUnreachable(msg),
            GatewayError::NotFound(id) => ControllerError::UnknownRecord(id),
            GatewayError::UserRejected => ControllerError::LedgerRejected(RejectReason::Declined),
            GatewayError::Reverted(reason) => {
                ControllerError::LedgerRejected(RejectReason::Reverted(reason))
            }
            GatewayError::DuplicateId(id) => ControllerError::LedgerRejected(
                RejectReason::Reverted(format!("record {id} already exists")),
            ),
            GatewayError::Timeout(what) => ControllerError::LedgerTimeout(what),
            GatewayError::AlreadyVerified => ControllerError::AlreadyVerified,
            GatewayError::NotInitialized | GatewayError::Encryption(_) => {
                ControllerError::EncryptionFailed(err.to_string())
            }
            GatewayError::Decryption(msg) => ControllerError::DecryptionFailed(msg),
        }
    }

    /// Map a failure from the encryption service
    pub fn from_encryption(err: GatewayError) -> Self {
        match err {
            GatewayError::Encryption(msg) => ControllerError::EncryptionFailed(msg),
            other => ControllerError::EncryptionFailed(other.to_string()),
        }
    }

    /// Map a failure from the decrypt-and-submit exchange.
    ///
    /// Ledger errors raised by the proof submission keep their ledger kind.
    pub fn from_decryption(err: GatewayError) -> Self {
        match err {
            GatewayError::NotInitialized | GatewayError::Encryption(_) => {
                ControllerError::DecryptionFailed(err.to_string())
            }
            other => Self::from_ledger(other),
        }
    }

    /// Benign errors are reported as success to the user
    pub fn is_benign(&self) -> bool {
        matches!(self, ControllerError::AlreadyVerified)
    }
}
