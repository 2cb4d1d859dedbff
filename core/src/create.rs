//! Create Protocol
//!
//! ```text
//! Idle -> Encrypting -> Submitting -> AwaitingInclusion -> Syncing -> Done
//!             |             |               |
//!             +-------------+---------------+--> Failed
//! ```
//!
//! The sensitive amount only ever leaves this module as ciphertext.

use serde::Serialize;
use tracing::{debug, info, warn};

use cloak_gateway::{GatewayError, NewRecord, TxReceipt};
use cloak_record::{Address, Category, RecordId};

use crate::controller::{LifecycleController, with_confirmation_timeout, with_read_timeout};
use crate::error::{ControllerError, RejectReason};
use crate::ids::IdCandidates;
use crate::sync::SyncReport;

/// Validated intake for a new record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub title: String,
    pub category: Category,
    /// Sensitive value; encrypted before submission
    pub amount: u64,
}

impl CreateRequest {
    pub fn new(
        title: impl Into<String>,
        category: Category,
        amount: u64,
    ) -> Result<Self, ControllerError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ControllerError::InvalidRequest("title is required".into()));
        }
        Ok(Self {
            title,
            category,
            amount,
        })
    }

    /// Build from raw form fields.
    ///
    /// The amount field keeps digits only, so "1,250" and "$40" are accepted.
    pub fn from_form(title: &str, amount: &str, category: &str) -> Result<Self, ControllerError> {
        let digits: String = amount.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(ControllerError::InvalidRequest("amount is required".into()));
        }
        let amount = digits
            .parse::<u64>()
            .map_err(|e| ControllerError::InvalidRequest(format!("amount: {e}")))?;

        let selector = category
            .trim()
            .parse::<u8>()
            .map_err(|_| ControllerError::InvalidRequest(format!("category: {category:?}")))?;
        let category =
            Category::new(selector).map_err(|e| ControllerError::InvalidRequest(e.to_string()))?;

        Self::new(title, category, amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateReport {
    pub record_id: RecordId,
    pub receipt: TxReceipt,
    /// `None` if the follow-up sync failed; the record is still on the ledger
    pub sync: Option<SyncReport>,
}

fn failure_message(err: &ControllerError) -> &'static str {
    match err {
        ControllerError::LedgerRejected(RejectReason::Declined) => "Transaction rejected",
        ControllerError::LedgerTimeout(_) => "Confirmation timed out",
        _ => "Submission failed",
    }
}

impl LifecycleController {
    /// Encrypt the amount, submit the record and wait for inclusion
    pub async fn create(&self, request: CreateRequest) -> Result<CreateReport, ControllerError> {
        let identity = self.require_identity().await?;
        self.status.pending("Creating request with encryption...");

        match self.run_create(&identity, request).await {
            Ok(report) => {
                self.status.success("Request created!");
                Ok(report)
            }
            Err(e) => {
                warn!("Create failed: {}", e);
                self.status.error(failure_message(&e));
                Err(e)
            }
        }
    }

    async fn run_create(
        &self,
        identity: &Address,
        request: CreateRequest,
    ) -> Result<CreateReport, ControllerError> {
        self.ensure_encryption().await?;
        let mut candidates = IdCandidates::new((self.id_clock)(), self.settings.max_id_attempts);
        let mut id = self.allocate_id(&mut candidates).await?;

        let input = self
            .encryptor
            .encrypt(&self.settings.context, identity, request.amount)
            .await
            .map_err(ControllerError::from_encryption)?;

        // The ciphertext is not bound to the id, so a taken id only needs a
        // fresh candidate before the same input is resubmitted
        let tx = loop {
            let record = NewRecord {
                id: id.clone(),
                title: request.title.clone(),
                ciphertext: input.ciphertext.clone(),
                input_proof: input.proof.clone(),
                category: request.category.value(),
                secondary: 0,
                purpose: self.settings.purpose_label.clone(),
            };
            match self.ledger.create_record(identity, record).await {
                Ok(tx) => break tx,
                Err(GatewayError::DuplicateId(taken)) => {
                    debug!("Id {} was taken before our write landed", taken);
                    id = self.allocate_id(&mut candidates).await?;
                }
                Err(e) => return Err(ControllerError::from_ledger(e)),
            }
        };

        self.status.pending("Waiting for confirmation...");
        let receipt = with_confirmation_timeout(
            self.ledger.as_ref(),
            &tx,
            self.settings.confirmation_timeout,
        )
        .await
        .map_err(ControllerError::from_ledger)?;
        info!("Record {} included in block {}", id, receipt.block);

        let sync = match self.reconcile().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Sync after create failed: {}", e);
                None
            }
        };

        Ok(CreateReport {
            record_id: id,
            receipt,
            sync,
        })
    }

    /// Pick the next candidate unknown to the session, this controller and
    /// the ledger
    async fn allocate_id(
        &self,
        candidates: &mut IdCandidates,
    ) -> Result<RecordId, ControllerError> {
        for candidate in candidates.by_ref() {
            let in_view = self.session.read().await.view().contains(&candidate);
            let issued = self.issued_ids.lock().await.contains(&candidate);
            if in_view || issued {
                debug!("Id {} already known locally", candidate);
                continue;
            }

            match with_read_timeout(self.settings.read_timeout, self.ledger.get_record(&candidate))
                .await
            {
                Ok(_) => {
                    debug!("Id {} already on the ledger", candidate);
                    continue;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(ControllerError::from_ledger(e)),
            }

            if self.issued_ids.lock().await.reserve(candidate.clone()) {
                return Ok(candidate);
            }
        }
        Err(ControllerError::IdExhausted(candidates.budget()))
    }
}
