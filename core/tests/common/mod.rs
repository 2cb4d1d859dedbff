#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use cloak_core::{ControllerSettings, DisplayPolicy, LifecycleController};
use cloak_devnet::Devnet;
use cloak_gateway::{
    CiphertextHandle, ContractAddress, DecryptionProof, DecryptionVerifier, EncryptedInput,
    EncryptionService, GatewayError, LedgerGateway, NewRecord, ProofSubmitter, TxHash, TxReceipt,
    VerifiedDecryption,
};
use cloak_record::{Address, Category, Record, RecordId};

pub const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
pub const BOB: &str = "0xB0B0000000000000000000000000000000000002";

/// Helpers

pub fn settings(context: &ContractAddress) -> ControllerSettings {
    ControllerSettings {
        context: context.clone(),
        confirmation_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
        display: DisplayPolicy::default(),
        max_id_attempts: 5,
        purpose_label: "Alumni Support Request".into(),
    }
}

/// Devnet services behind a scriptable ledger, plus a controller wired to them
pub struct Harness {
    pub devnet: Devnet,
    pub ledger: Arc<ScriptedLedger>,
    pub controller: LifecycleController,
}

impl Harness {
    pub fn new() -> Self {
        let devnet = Devnet::default();
        let settings = settings(&devnet.context);
        Self::with_settings(devnet, settings)
    }

    pub fn with_settings(devnet: Devnet, settings: ControllerSettings) -> Self {
        let ledger = Arc::new(ScriptedLedger::new(devnet.ledger.clone()));
        let controller = LifecycleController::new(
            ledger.clone(),
            devnet.encryptor.clone(),
            devnet.kms.clone(),
            settings,
        );
        Self {
            devnet,
            ledger,
            controller,
        }
    }

    /// Devnet ledger with encryption and decryption services picked by `build`
    pub fn with_services(
        build: impl FnOnce(&Devnet) -> (Arc<dyn EncryptionService>, Arc<dyn DecryptionVerifier>),
    ) -> Self {
        let devnet = Devnet::default();
        let (encryptor, verifier) = build(&devnet);
        let ledger = Arc::new(ScriptedLedger::new(devnet.ledger.clone()));
        let controller = LifecycleController::new(
            ledger.clone(),
            encryptor,
            verifier,
            settings(&devnet.context),
        );
        Self {
            devnet,
            ledger,
            controller,
        }
    }

    /// Derive new record ids from `clock` instead of the system time
    pub fn with_id_clock(self, clock: fn() -> u128) -> Self {
        Self {
            controller: self.controller.with_id_clock(clock),
            ..self
        }
    }

    /// A second controller sharing this devnet, as another browser tab would
    pub fn second_controller(&self) -> LifecycleController {
        LifecycleController::new(
            self.ledger.clone(),
            self.devnet.encryptor.clone(),
            self.devnet.kms.clone(),
            settings(&self.devnet.context),
        )
    }

    /// Put a record on the ledger without going through the controller
    pub async fn seed_record(&self, creator: &str, id: &str, title: &str, amount: u64) -> RecordId {
        let creator = Address::from(creator);
        let input = self
            .devnet
            .coprocessor
            .seal(&self.devnet.context, &creator, amount)
            .unwrap();
        let tx = self
            .devnet
            .ledger
            .create_record(
                &creator,
                NewRecord {
                    id: RecordId::from(id),
                    title: title.into(),
                    ciphertext: input.ciphertext,
                    input_proof: input.proof,
                    category: Category::ASSISTANCE.value(),
                    secondary: 0,
                    purpose: "Alumni Support Request".into(),
                },
            )
            .await
            .unwrap();
        self.devnet.ledger.wait_for_inclusion(&tx).await.unwrap();
        RecordId::from(id)
    }
}

// ============================================================================
// Scripted ledger
// ============================================================================

/// Pause points for one enumeration
pub struct EnumerationHold {
    /// Signalled once the held enumeration has read the id list
    pub reached: Arc<Notify>,
    /// Lets the held enumeration return
    pub release: Arc<Notify>,
}

/// Wraps the devnet ledger with injectable read faults
pub struct ScriptedLedger {
    inner: Arc<cloak_devnet::MemoryLedger>,
    failing: Mutex<HashSet<RecordId>>,
    hidden: Mutex<HashSet<RecordId>>,
    stale: Mutex<HashSet<RecordId>>,
    phantom_ids: Mutex<Vec<RecordId>>,
    enumeration_down: AtomicBool,
    hold: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl ScriptedLedger {
    pub fn new(inner: Arc<cloak_devnet::MemoryLedger>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            hidden: Mutex::new(HashSet::new()),
            stale: Mutex::new(HashSet::new()),
            phantom_ids: Mutex::new(Vec::new()),
            enumeration_down: AtomicBool::new(false),
            hold: Mutex::new(None),
        }
    }

    /// Reads of `id` fail as unreachable
    pub fn fail_reads_of(&self, id: &RecordId) {
        self.failing.lock().unwrap().insert(id.clone());
    }

    /// Reads of `id` report not found although the record exists
    pub fn hide(&self, id: &RecordId) {
        self.hidden.lock().unwrap().insert(id.clone());
    }

    /// The next read of `id` returns it as unverified, as a lagging node would
    pub fn stale_read_of(&self, id: &RecordId) {
        self.stale.lock().unwrap().insert(id.clone());
    }

    /// Enumeration fails as unreachable while set; record reads still work
    pub fn fail_enumeration(&self, down: bool) {
        self.enumeration_down.store(down, Ordering::SeqCst);
    }

    /// Enumeration also lists `id`, which has no record behind it
    pub fn list_phantom(&self, id: &str) {
        self.phantom_ids.lock().unwrap().push(RecordId::from(id));
    }

    /// Hold the next enumeration after it has read the id list
    pub fn hold_next_enumeration(&self) -> EnumerationHold {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some((reached.clone(), release.clone()));
        EnumerationHold { reached, release }
    }
}

#[async_trait]
impl LedgerGateway for ScriptedLedger {
    async fn enumerate_ids(&self) -> Result<Vec<RecordId>, GatewayError> {
        if self.enumeration_down.load(Ordering::SeqCst) {
            return Err(GatewayError::Unreachable("enumeration dropped".into()));
        }
        let hold = self.hold.lock().unwrap().take();

        let mut ids = self.inner.enumerate_ids().await?;
        ids.extend(self.phantom_ids.lock().unwrap().iter().cloned());

        if let Some((reached, release)) = hold {
            reached.notify_one();
            release.notified().await;
        }
        Ok(ids)
    }

    async fn get_record(&self, id: &RecordId) -> Result<Record, GatewayError> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(GatewayError::Unreachable(format!("read of {id} dropped")));
        }
        if self.hidden.lock().unwrap().contains(id) {
            return Err(GatewayError::NotFound(id.clone()));
        }
        let stale = self.stale.lock().unwrap().remove(id);

        let mut record = self.inner.get_record(id).await?;
        if stale {
            record.verified = false;
            record.revealed_value = 0;
        }
        Ok(record)
    }

    async fn get_ciphertext_handle(&self, id: &RecordId) -> Result<CiphertextHandle, GatewayError> {
        self.inner.get_ciphertext_handle(id).await
    }

    async fn is_available(&self) -> Result<bool, GatewayError> {
        self.inner.is_available().await
    }

    async fn create_record(
        &self,
        signer: &Address,
        record: NewRecord,
    ) -> Result<TxHash, GatewayError> {
        self.inner.create_record(signer, record).await
    }

    async fn submit_verification(
        &self,
        signer: &Address,
        id: &RecordId,
        encoded_cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> Result<TxHash, GatewayError> {
        self.inner
            .submit_verification(signer, id, encoded_cleartext, proof)
            .await
    }

    async fn wait_for_inclusion(&self, tx: &TxHash) -> Result<TxReceipt, GatewayError> {
        self.inner.wait_for_inclusion(tx).await
    }
}

// ============================================================================
// Failing services
// ============================================================================

/// Encryption backend whose setup never succeeds
pub struct BrokenEncryptor;

#[async_trait]
impl EncryptionService for BrokenEncryptor {
    async fn initialize(&self) -> Result<(), GatewayError> {
        Err(GatewayError::Encryption("relayer unreachable".into()))
    }

    fn is_initialized(&self) -> bool {
        false
    }

    async fn encrypt(
        &self,
        _context: &ContractAddress,
        _requester: &Address,
        _value: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        Err(GatewayError::NotInitialized)
    }
}

/// Decryption service that fails before anything reaches the ledger
pub struct BrokenVerifier;

#[async_trait]
impl DecryptionVerifier for BrokenVerifier {
    async fn verify_decryption(
        &self,
        _handles: &[CiphertextHandle],
        _context: &ContractAddress,
        _submitter: &dyn ProofSubmitter,
    ) -> Result<VerifiedDecryption, GatewayError> {
        Err(GatewayError::Decryption("key share timeout".into()))
    }
}
