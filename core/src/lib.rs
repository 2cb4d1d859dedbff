//! Cloak Core
//!
//! Client-side controller for encrypted requests: creation with an
//! encrypted amount, ledger sync, and verification by decrypt-and-prove.
//!
//! ```text
//!                       ┌───────────────────────────────┐
//!   create / verify ───▶│      LifecycleController      │───▶ StatusBoard
//!   sync / search       │  identity · SessionState ·    │     (one slot)
//!                       │  sync tickets · issued ids    │
//!                       └──┬────────────┬────────────┬──┘
//!                          │            │            │
//!                   Encryption      Ledger      Decryption /
//!                    Service        Gateway     Verification
//! ```
//!
//! Every record-set change goes through a sync: the controller never
//! patches its view from write responses.

pub mod controller;
pub mod create;
pub mod error;
pub mod ids;
pub mod status;
pub mod sync;
pub mod verify;
pub mod view;

pub use controller::{ControllerSettings, LifecycleController};
pub use create::{CreateReport, CreateRequest};
pub use error::{ControllerError, RejectReason};
pub use status::{DisplayPolicy, Notification, StatusBoard, StatusKind};
pub use sync::{SyncReport, fetch_snapshot};
pub use verify::{RecordProofSubmitter, Reveal, VerifyPath, VerifyReport};
pub use view::{RequestStats, SessionView, Snapshot, compute_stats, search, user_history};
