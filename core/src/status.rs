//! Operation Status
//!
//! One notification slot shared by every operation. Whatever was posted
//! last wins; terminal notifications carry an expiry instant the reader
//! checks, so nothing has to run a timer to clear them.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

/// A status message with its display window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: StatusKind,
    pub message: String,
    pub posted_at: Instant,
    /// `None` for pending notifications, which stay until replaced
    pub expires_at: Option<Instant>,
}

impl Notification {
    pub fn is_visible_at(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expiry| now < expiry)
    }
}

/// How long terminal notifications stay visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPolicy {
    pub success: Duration,
    pub error: Duration,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self {
            success: Duration::from_millis(2000),
            error: Duration::from_millis(3000),
        }
    }
}

impl DisplayPolicy {
    fn lifetime(&self, kind: StatusKind) -> Option<Duration> {
        match kind {
            StatusKind::Pending => None,
            StatusKind::Success => Some(self.success),
            StatusKind::Error => Some(self.error),
        }
    }
}

pub struct StatusBoard {
    slot: watch::Sender<Option<Notification>>,
    policy: DisplayPolicy,
}

impl StatusBoard {
    pub fn new(policy: DisplayPolicy) -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot, policy }
    }

    pub fn pending(&self, message: impl Into<String>) {
        self.post(StatusKind::Pending, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.post(StatusKind::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.post(StatusKind::Error, message.into());
    }

    fn post(&self, kind: StatusKind, message: String) {
        let posted_at = Instant::now();
        let expires_at = self.policy.lifetime(kind).map(|ttl| posted_at + ttl);
        self.slot.send_replace(Some(Notification {
            kind,
            message,
            posted_at,
            expires_at,
        }));
    }

    pub fn clear(&self) {
        self.slot.send_replace(None);
    }

    /// The notification to display at `now`, if any
    pub fn current(&self, now: Instant) -> Option<Notification> {
        self.slot
            .borrow()
            .as_ref()
            .filter(|n| n.is_visible_at(now))
            .cloned()
    }

    /// Last posted notification regardless of expiry
    pub fn latest(&self) -> Option<Notification> {
        self.slot.borrow().clone()
    }

    /// Change stream for the presentation layer
    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.slot.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(DisplayPolicy::default())
    }
}
