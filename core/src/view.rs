//! Session View
//!
//! Everything the presentation layer reads. Stats and history are
//! recomputed from the full record set whenever the set or the active
//! identity changes; nothing here is patched incrementally.

use serde::Serialize;

use cloak_record::{Address, Record, RecordId};

/// Aggregate counts over the record set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
}

pub fn compute_stats(records: &[Record]) -> RequestStats {
    let total = records.len();
    let verified = records.iter().filter(|r| r.verified).count();
    RequestStats {
        total,
        verified,
        pending: total - verified,
    }
}

/// Records created by `identity` (case-insensitive); empty without an identity
pub fn user_history(records: &[Record], identity: Option<&Address>) -> Vec<Record> {
    match identity {
        Some(identity) => records
            .iter()
            .filter(|r| r.is_created_by(identity))
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

/// Case-insensitive filter over title and description. The query is used
/// as typed, so only an empty query keeps everything.
pub fn search(records: &[Record], query: &str) -> Vec<Record> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records.iter().filter(|r| r.matches(&needle)).cloned().collect()
}

/// Read-only snapshot of the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub records: Vec<Record>,
    pub stats: RequestStats,
    pub user_history: Vec<Record>,
}

impl SessionView {
    fn derive(records: Vec<Record>, identity: Option<&Address>) -> Self {
        let stats = compute_stats(&records);
        let user_history = user_history(&records, identity);
        Self {
            records,
            stats,
            user_history,
        }
    }

    pub fn record(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.record(id).is_some()
    }
}

/// Ledger records gathered by one sync run
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Start order of the sync that produced this snapshot
    pub ticket: u64,
    pub records: Vec<Record>,
    /// Ids whose fetch failed and were left out
    pub dropped: Vec<RecordId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A sync that started later has already been applied
    Superseded { applied_ticket: u64 },
}

/// Session state owned by the controller
#[derive(Debug, Default)]
pub struct SessionState {
    view: SessionView,
    applied_ticket: u64,
}

impl SessionState {
    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn applied_ticket(&self) -> u64 {
        self.applied_ticket
    }

    /// Replace the record set wholesale unless a newer snapshot already landed
    pub fn apply(&mut self, snapshot: Snapshot, identity: Option<&Address>) -> ApplyOutcome {
        if snapshot.ticket < self.applied_ticket {
            return ApplyOutcome::Superseded {
                applied_ticket: self.applied_ticket,
            };
        }
        self.applied_ticket = snapshot.ticket;
        self.view = SessionView::derive(snapshot.records, identity);
        ApplyOutcome::Applied
    }

    /// Recompute derived state after an identity change
    pub fn rederive(&mut self, identity: Option<&Address>) {
        let records = std::mem::take(&mut self.view.records);
        self.view = SessionView::derive(records, identity);
    }

    /// Drop everything fetched this session.
    ///
    /// The ticket high-water mark survives so an in-flight sync from before
    /// the reset cannot repopulate the view.
    pub fn clear(&mut self) {
        self.view = SessionView::default();
    }

    /// Raise the high-water mark without applying anything
    pub fn fence(&mut self, ticket: u64) {
        self.applied_ticket = self.applied_ticket.max(ticket);
    }
}
