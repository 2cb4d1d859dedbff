//! Lifecycle Controller
//!
//! Owns the session state and the status slot, and holds the three
//! external services. The protocols themselves live in `create`, `sync`
//! and `verify`; this module covers the session around them.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use cloak_config::CloakConfig;
use cloak_gateway::{
    ContractAddress, DecryptionVerifier, EncryptionService, GatewayError, LedgerGateway, TxHash,
    TxReceipt,
};
use cloak_record::{Address, Record, RecordId};

use crate::error::ControllerError;
use crate::ids::{IssuedIds, now_millis};
use crate::status::{DisplayPolicy, StatusBoard};
use crate::sync::SyncReport;
use crate::view::{RequestStats, SessionState, SessionView, search};

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Target context for encryption and decryption
    pub context: ContractAddress,
    pub confirmation_timeout: Duration,
    pub read_timeout: Duration,
    pub display: DisplayPolicy,
    pub max_id_attempts: u32,
    pub purpose_label: String,
}

impl ControllerSettings {
    pub fn from_config(config: &CloakConfig) -> Self {
        Self {
            context: ContractAddress::new(config.ledger.contract_address.clone()),
            confirmation_timeout: config.confirmation_timeout(),
            read_timeout: config.read_timeout(),
            display: DisplayPolicy {
                success: config.success_display(),
                error: config.error_display(),
            },
            // Zero would fail every create before trying a single id
            max_id_attempts: config.create.max_id_attempts.max(1),
            purpose_label: config.create.purpose_label.clone(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&CloakConfig::default())
    }
}

/// Bound a ledger read; a read that never answers counts as unreachable.
pub(crate) async fn with_read_timeout<T, F>(limit: Duration, read: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    tokio::time::timeout(limit, read)
        .await
        .map_err(|_| GatewayError::Unreachable(format!("no response within {limit:?}")))?
}

/// Wait for block inclusion of `tx`, bounded by `limit`
pub(crate) async fn with_confirmation_timeout(
    ledger: &dyn LedgerGateway,
    tx: &TxHash,
    limit: Duration,
) -> Result<TxReceipt, GatewayError> {
    tokio::time::timeout(limit, ledger.wait_for_inclusion(tx))
        .await
        .map_err(|_| GatewayError::Timeout(format!("inclusion of {tx}")))?
}

// ============================================================================
// Controller
// ============================================================================

pub struct LifecycleController {
    pub(crate) ledger: Arc<dyn LedgerGateway>,
    pub(crate) encryptor: Arc<dyn EncryptionService>,
    pub(crate) verifier: Arc<dyn DecryptionVerifier>,
    pub(crate) settings: ControllerSettings,
    /// Lock order: `identity` before `session`
    pub(crate) identity: RwLock<Option<Address>>,
    pub(crate) session: RwLock<SessionState>,
    pub(crate) status: StatusBoard,
    pub(crate) issued_ids: Mutex<IssuedIds>,
    /// Timestamp source for new record ids
    pub(crate) id_clock: fn() -> u128,
    sync_tickets: AtomicU64,
    init_lock: Mutex<()>,
}

impl LifecycleController {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        encryptor: Arc<dyn EncryptionService>,
        verifier: Arc<dyn DecryptionVerifier>,
        settings: ControllerSettings,
    ) -> Self {
        let status = StatusBoard::new(settings.display);
        Self {
            ledger,
            encryptor,
            verifier,
            settings,
            identity: RwLock::new(None),
            session: RwLock::new(SessionState::default()),
            status,
            issued_ids: Mutex::new(IssuedIds::default()),
            id_clock: now_millis,
            sync_tickets: AtomicU64::new(0),
            init_lock: Mutex::new(()),
        }
    }

    /// Replace the millisecond clock that new record ids are derived from
    pub fn with_id_clock(mut self, clock: fn() -> u128) -> Self {
        self.id_clock = clock;
        self
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub(crate) fn next_ticket(&self) -> u64 {
        self.sync_tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Bind a wallet identity, prepare encryption and load the record set.
    ///
    /// A failed encryption setup is reported but does not block the
    /// session; the next create retries it.
    pub async fn connect(&self, identity: Address) -> Result<SyncReport, ControllerError> {
        info!("Connecting {}", identity);
        {
            let mut slot = self.identity.write().await;
            *slot = Some(identity);
            self.session.write().await.rederive(slot.as_ref());
        }

        if let Err(e) = self.ensure_encryption().await {
            warn!("Encryption setup failed: {}", e);
            self.status.error("Encryption initialization failed");
        }

        self.sync().await
    }

    /// Forget the identity and everything fetched for it
    pub async fn disconnect(&self) {
        let mut slot = self.identity.write().await;
        if let Some(identity) = slot.take() {
            info!("Disconnecting {}", identity);
        }

        let fence = self.next_ticket();
        let mut session = self.session.write().await;
        session.fence(fence);
        session.clear();
        drop(session);
        drop(slot);

        self.issued_ids.lock().await.clear();
        self.status.clear();
    }

    pub async fn identity(&self) -> Option<Address> {
        self.identity.read().await.clone()
    }

    /// The connected identity, or `Unauthenticated` with a status prompt
    pub(crate) async fn require_identity(&self) -> Result<Address, ControllerError> {
        match self.identity().await {
            Some(identity) => Ok(identity),
            None => {
                self.status.error("Please connect wallet first");
                Err(ControllerError::Unauthenticated)
            }
        }
    }

    /// Initialise the encryption service once per session
    pub(crate) async fn ensure_encryption(&self) -> Result<(), ControllerError> {
        if self.encryptor.is_initialized() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        if self.encryptor.is_initialized() {
            return Ok(());
        }
        self.encryptor
            .initialize()
            .await
            .map_err(ControllerError::from_encryption)?;
        info!("Encryption service initialized");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub async fn view(&self) -> SessionView {
        self.session.read().await.view().clone()
    }

    pub async fn records(&self) -> Vec<Record> {
        self.session.read().await.view().records.clone()
    }

    pub async fn stats(&self) -> RequestStats {
        self.session.read().await.view().stats
    }

    pub async fn user_history(&self) -> Vec<Record> {
        self.session.read().await.view().user_history.clone()
    }

    pub async fn record(&self, id: &RecordId) -> Option<Record> {
        self.session.read().await.view().record(id).cloned()
    }

    /// Filtered listing; never touches the ledger
    pub async fn search(&self, query: &str) -> Vec<Record> {
        search(&self.session.read().await.view().records, query)
    }

    // ------------------------------------------------------------------
    // Availability
    // ------------------------------------------------------------------

    /// Probe the ledger's health endpoint
    pub async fn check_availability(&self) -> Result<bool, ControllerError> {
        match with_read_timeout(self.settings.read_timeout, self.ledger.is_available()).await {
            Ok(true) => {
                self.status.success("System available!");
                Ok(true)
            }
            Ok(false) => {
                self.status.error("System unavailable");
                Ok(false)
            }
            Err(e) => {
                warn!("Availability check failed: {}", e);
                self.status.error("Check failed");
                Err(ControllerError::from_ledger(e))
            }
        }
    }
}
