//! Sync Protocol
//!
//! Enumerate ledger ids, fetch every record concurrently and swap the
//! result into the session in one step. A record whose fetch fails is
//! dropped from the snapshot; only a failed enumeration fails the sync.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use cloak_gateway::LedgerGateway;

use crate::controller::{LifecycleController, with_read_timeout};
use crate::error::ControllerError;
use crate::view::{ApplyOutcome, Snapshot};

/// Result of one sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub ticket: u64,
    /// False when a later sync had already been applied
    pub applied: bool,
    pub records: usize,
    pub dropped: usize,
}

/// Gather a full snapshot from the ledger
pub async fn fetch_snapshot(
    ledger: &dyn LedgerGateway,
    ticket: u64,
    read_timeout: Duration,
) -> Result<Snapshot, ControllerError> {
    let ids = with_read_timeout(read_timeout, ledger.enumerate_ids())
        .await
        .map_err(|e| ControllerError::LedgerUnreachable(e.to_string()))?;

    let fetches = ids.into_iter().map(|id| async move {
        let result = with_read_timeout(read_timeout, ledger.get_record(&id)).await;
        (id, result)
    });

    let mut records = Vec::new();
    let mut dropped = Vec::new();
    for (id, result) in join_all(fetches).await {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Dropping record {} from snapshot: {}", id, e);
                dropped.push(id);
            }
        }
    }

    Ok(Snapshot {
        ticket,
        records,
        dropped,
    })
}

impl LifecycleController {
    /// Refresh the session from the ledger
    pub async fn sync(&self) -> Result<SyncReport, ControllerError> {
        self.reconcile().await.inspect_err(|e| {
            warn!("Sync failed: {}", e);
            self.status.error("Failed to load data");
        })
    }

    /// Sync without touching the status slot; used after writes
    pub(crate) async fn reconcile(&self) -> Result<SyncReport, ControllerError> {
        // Taken before the first await so start order decides precedence
        let ticket = self.next_ticket();
        let snapshot =
            fetch_snapshot(self.ledger.as_ref(), ticket, self.settings.read_timeout).await?;
        let records = snapshot.records.len();
        let dropped = snapshot.dropped.len();

        let identity = self.identity.read().await;
        let outcome = self.session.write().await.apply(snapshot, identity.as_ref());
        drop(identity);

        let applied = match outcome {
            ApplyOutcome::Applied => {
                debug!("Applied sync {} ({} records, {} dropped)", ticket, records, dropped);
                true
            }
            ApplyOutcome::Superseded { applied_ticket } => {
                debug!("Discarded sync {}, {} already applied", ticket, applied_ticket);
                false
            }
        };

        Ok(SyncReport {
            ticket,
            applied,
            records,
            dropped,
        })
    }
}
