//! Record Id Allocation
//!
//! Ids are `request-<unix millis>`. A candidate that collides with a known
//! id, or whose write is refused as a duplicate, is regenerated with a
//! random suffix until the attempt budget runs out.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use cloak_record::RecordId;

const ID_PREFIX: &str = "request";

pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Candidate id for a given attempt; only retries carry a suffix
pub fn candidate_id(millis: u128, attempt: u32) -> RecordId {
    if attempt == 0 {
        RecordId::new(format!("{ID_PREFIX}-{millis}"))
    } else {
        let suffix: u32 = rand::thread_rng().r#gen();
        RecordId::new(format!("{ID_PREFIX}-{millis}-{suffix:08x}"))
    }
}

/// Candidate ids for one create, bounded by the attempt budget.
///
/// The budget covers both local collision checks and writes refused by
/// the ledger.
#[derive(Debug, Clone)]
pub struct IdCandidates {
    millis: u128,
    next_attempt: u32,
    budget: u32,
}

impl IdCandidates {
    pub fn new(millis: u128, budget: u32) -> Self {
        Self {
            millis,
            next_attempt: 0,
            budget,
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }
}

impl Iterator for IdCandidates {
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        if self.next_attempt >= self.budget {
            return None;
        }
        let candidate = candidate_id(self.millis, self.next_attempt);
        self.next_attempt += 1;
        Some(candidate)
    }
}

/// Ids handed out by this session, so two creates in the same millisecond
/// never reuse a candidate even before either lands on the ledger.
#[derive(Debug, Default)]
pub struct IssuedIds {
    issued: HashSet<RecordId>,
}

impl IssuedIds {
    pub fn contains(&self, id: &RecordId) -> bool {
        self.issued.contains(id)
    }

    /// Returns false if `id` was already issued
    pub fn reserve(&mut self, id: RecordId) -> bool {
        self.issued.insert(id)
    }

    pub fn clear(&mut self) {
        self.issued.clear();
    }
}
