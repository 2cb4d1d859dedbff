//! Gateway error types

use cloak_record::RecordId;
use thiserror::Error;

/// Revert reason the request contract uses for a second verification
pub const ALREADY_VERIFIED_REASON: &str = "Data already verified";

/// Marker wallets put in the error when the user declines to sign
pub const USER_REJECTED_REASON: &str = "user rejected transaction";

/// Failures surfaced by external services
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Read path could not reach the ledger
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// User declined to authorize the write
    #[error("user rejected transaction")]
    UserRejected,

    /// Contract-level revert
    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("record already exists: {0}")]
    DuplicateId(RecordId),

    /// The record was verified by an earlier submission
    #[error("data already verified")]
    AlreadyVerified,

    #[error("service not initialized")]
    NotInitialized,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),
}

impl GatewayError {
    /// Classify a raw revert or wallet error string.
    ///
    /// Wallet and contract errors reach clients as free text; the two
    /// reasons with dedicated handling are recognised by substring.
    pub fn from_revert_reason(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.contains(ALREADY_VERIFIED_REASON) {
            GatewayError::AlreadyVerified
        } else if reason.contains(USER_REJECTED_REASON) {
            GatewayError::UserRejected
        } else {
            GatewayError::Reverted(reason)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_classification() {
        assert_eq!(
            GatewayError::from_revert_reason("execution reverted: Data already verified"),
            GatewayError::AlreadyVerified
        );
        assert_eq!(
            GatewayError::from_revert_reason("MetaMask: user rejected transaction"),
            GatewayError::UserRejected
        );
        assert_eq!(
            GatewayError::from_revert_reason("Invalid input proof"),
            GatewayError::Reverted("Invalid input proof".into())
        );
    }

    #[test]
    fn test_predicates() {
        assert!(GatewayError::NotFound(RecordId::from("x")).is_not_found());
        assert!(!GatewayError::UserRejected.is_not_found());
    }
}
