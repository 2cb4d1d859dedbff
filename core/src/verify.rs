//! Verify Protocol
//!
//! ```text
//! Idle -> CheckVerified --verified--> Done(AlreadyVerified)
//!              |
//!              v
//!         FetchHandle -> DecryptAndProve -> SubmitProof -> AwaitingInclusion -> Syncing -> Done
//!                                               |
//!                                               +--"already verified"--> Syncing -> Done(ConcurrentlyVerified)
//! ```
//!
//! Decryption and proof submission run as one exchange with the
//! decryption service, which lands the proof through [`RecordProofSubmitter`].
//! A verification lost to a concurrent submitter is reported as success.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use cloak_gateway::{DecryptionProof, GatewayError, LedgerGateway, ProofSubmitter, TxReceipt};
use cloak_record::{Address, Record, RecordId};

use crate::controller::{LifecycleController, with_confirmation_timeout, with_read_timeout};
use crate::error::{ControllerError, RejectReason};

/// A revealed cleartext and how far it can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Reveal {
    /// Read back from a synced, verified ledger record
    Confirmed(u64),
    /// Returned by the decryption service; the follow-up sync has not
    /// shown the record as verified yet
    Provisional(u64),
}

impl Reveal {
    pub fn value(self) -> u64 {
        match self {
            Reveal::Confirmed(v) | Reveal::Provisional(v) => v,
        }
    }

    pub fn is_confirmed(self) -> bool {
        matches!(self, Reveal::Confirmed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyPath {
    /// Record was verified before this call
    AlreadyVerified,
    /// This call landed the proof
    Decrypted,
    /// Another submitter landed its proof first
    ConcurrentlyVerified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub record_id: RecordId,
    pub path: VerifyPath,
    pub reveal: Option<Reveal>,
}

/// Submits a decryption proof for one record and waits for inclusion
pub struct RecordProofSubmitter<'a> {
    pub ledger: &'a dyn LedgerGateway,
    pub signer: &'a Address,
    pub record_id: &'a RecordId,
    pub confirmation_timeout: Duration,
}

#[async_trait]
impl<'a> ProofSubmitter for RecordProofSubmitter<'a> {
    async fn submit(
        &self,
        encoded_cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> Result<TxReceipt, GatewayError> {
        let tx = self
            .ledger
            .submit_verification(self.signer, self.record_id, encoded_cleartext, proof)
            .await?;
        debug!("Verification of {} broadcast as {}", self.record_id, tx);
        with_confirmation_timeout(self.ledger, &tx, self.confirmation_timeout).await
    }
}

/// What the decrypt-and-submit exchange produced
enum Exchange {
    Decrypted(u64),
    LostRace,
}

fn failure_message(err: &ControllerError) -> &'static str {
    match err {
        ControllerError::LedgerRejected(RejectReason::Declined) => "Transaction rejected",
        ControllerError::LedgerTimeout(_) => "Confirmation timed out",
        _ => "Decryption failed",
    }
}

impl LifecycleController {
    /// Reveal a record's cleartext and mark it verified on the ledger
    pub async fn verify(&self, id: &RecordId) -> Result<VerifyReport, ControllerError> {
        let identity = self.require_identity().await?;
        self.status.pending("Verifying...");

        match self.run_verify(&identity, id).await {
            Ok(report) => {
                let message = match report.path {
                    VerifyPath::Decrypted => "Verified successfully!",
                    VerifyPath::AlreadyVerified | VerifyPath::ConcurrentlyVerified => {
                        "Already verified"
                    }
                };
                self.status.success(message);
                Ok(report)
            }
            Err(e) => {
                warn!("Verify of {} failed: {}", id, e);
                self.status.error(failure_message(&e));
                Err(e)
            }
        }
    }

    async fn run_verify(
        &self,
        identity: &Address,
        id: &RecordId,
    ) -> Result<VerifyReport, ControllerError> {
        let current = with_read_timeout(self.settings.read_timeout, self.ledger.get_record(id))
            .await
            .map_err(ControllerError::from_ledger)?;
        if current.verified {
            debug!("Record {} already verified", id);
            return Ok(VerifyReport {
                record_id: id.clone(),
                path: VerifyPath::AlreadyVerified,
                reveal: Some(Reveal::Confirmed(current.revealed_value)),
            });
        }

        let handle = with_read_timeout(
            self.settings.read_timeout,
            self.ledger.get_ciphertext_handle(id),
        )
        .await
        .map_err(ControllerError::from_ledger)?;

        let submitter = RecordProofSubmitter {
            ledger: self.ledger.as_ref(),
            signer: identity,
            record_id: id,
            confirmation_timeout: self.settings.confirmation_timeout,
        };
        let exchange = match self
            .verifier
            .verify_decryption(&[handle], &self.settings.context, &submitter)
            .await
        {
            Ok(verified) => match verified.value_for(&handle) {
                Some(value) => {
                    info!("Record {} verified in block {}", id, verified.receipt.block);
                    Ok(Exchange::Decrypted(value))
                }
                None => Err(ControllerError::DecryptionFailed(format!(
                    "no cleartext returned for {handle}"
                ))),
            },
            Err(e) => match ControllerError::from_decryption(e) {
                err if err.is_benign() => {
                    info!("Record {} was verified concurrently", id);
                    Ok(Exchange::LostRace)
                }
                err => Err(err),
            },
        };

        // The ledger may have changed even when the exchange failed
        if let Err(e) = self.reconcile().await {
            warn!("Sync after verify failed: {}", e);
        }
        let exchange = exchange?;

        let confirmed = self
            .session
            .read()
            .await
            .view()
            .record(id)
            .and_then(Record::confirmed_value);

        let (path, reveal) = match exchange {
            Exchange::Decrypted(value) => (
                VerifyPath::Decrypted,
                Some(confirmed.map_or(Reveal::Provisional(value), Reveal::Confirmed)),
            ),
            Exchange::LostRace => (
                VerifyPath::ConcurrentlyVerified,
                confirmed.map(Reveal::Confirmed),
            ),
        };

        Ok(VerifyReport {
            record_id: id.clone(),
            path,
            reveal,
        })
    }
}
