//! In-Memory Ledger
//!
//! Enforces the request contract rules the controller depends on:
//! unique ids, proof-checked inputs, monotonic verification and the
//! "already verified" revert. Writes are mined into a block as soon as
//! they are accepted; [`MemoryLedger::set_inclusion_stalled`] holds the
//! inclusion wait open to exercise confirmation timeouts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use cloak_gateway::error::ALREADY_VERIFIED_REASON;
use cloak_gateway::{
    CiphertextHandle, ContractAddress, DecryptionProof, GatewayError, LedgerGateway, NewRecord,
    TxHash, TxReceipt,
};
use cloak_record::{Address, Record, RecordId, decode_words};

use crate::coprocessor::{CoprocessorKeys, handle_for};

struct StoredRecord {
    record: Record,
    ciphertext: Vec<u8>,
    handle: CiphertextHandle,
}

#[derive(Default)]
struct LedgerState {
    /// Ids in creation order
    order: Vec<RecordId>,
    entries: HashMap<RecordId, StoredRecord>,
    handles: HashMap<CiphertextHandle, RecordId>,
    receipts: HashMap<TxHash, TxReceipt>,
    block: u64,
    tx_nonce: u64,
    verification_writes: u64,
}

impl LedgerState {
    fn mine(&mut self, kind: &[u8], id: &RecordId) -> TxHash {
        self.tx_nonce += 1;
        self.block += 1;

        let mut hasher = blake3::Hasher::new();
        hasher.update(kind);
        hasher.update(id.as_str().as_bytes());
        hasher.update(&self.tx_nonce.to_le_bytes());
        let tx_hash = TxHash(*hasher.finalize().as_bytes());

        self.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block: self.block,
            },
        );
        tx_hash
    }
}

pub struct MemoryLedger {
    context: ContractAddress,
    keys: CoprocessorKeys,
    state: Mutex<LedgerState>,
    latency: Option<Duration>,
    available: AtomicBool,
    declining: AtomicBool,
    inclusion_stalled: AtomicBool,
}

impl MemoryLedger {
    pub fn new(context: ContractAddress, keys: CoprocessorKeys) -> Self {
        Self {
            context,
            keys,
            state: Mutex::new(LedgerState::default()),
            latency: None,
            available: AtomicBool::new(true),
            declining: AtomicBool::new(false),
            inclusion_stalled: AtomicBool::new(false),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn context(&self) -> &ContractAddress {
        &self.context
    }

    /// Take the ledger offline: reads fail and the health probe reports false
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Simulate a wallet that declines every signature request
    pub fn set_declining(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }

    /// Accept writes but never report their inclusion
    pub fn set_inclusion_stalled(&self, stalled: bool) {
        self.inclusion_stalled.store(stalled, Ordering::SeqCst);
    }

    /// Stored ciphertext behind `handle`
    pub async fn ciphertext_for(&self, handle: &CiphertextHandle) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        let id = state.handles.get(handle)?;
        state.entries.get(id).map(|entry| entry.ciphertext.clone())
    }

    /// Count of accepted verification writes
    pub async fn verification_writes(&self) -> u64 {
        self.state.lock().await.verification_writes
    }

    pub async fn record_count(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn block_height(&self) -> u64 {
        self.state.lock().await.block
    }

    /// Simulated network round trip. Always yields so concurrent callers interleave.
    async fn round_trip(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }

    fn ensure_reachable(&self) -> Result<(), GatewayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::Unreachable("ledger offline".into()))
        }
    }

    fn ensure_signed(&self) -> Result<(), GatewayError> {
        if self.declining.load(Ordering::SeqCst) {
            Err(GatewayError::UserRejected)
        } else {
            Ok(())
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn enumerate_ids(&self) -> Result<Vec<RecordId>, GatewayError> {
        self.round_trip().await;
        self.ensure_reachable()?;
        Ok(self.state.lock().await.order.clone())
    }

    async fn get_record(&self, id: &RecordId) -> Result<Record, GatewayError> {
        self.round_trip().await;
        self.ensure_reachable()?;
        self.state
            .lock()
            .await
            .entries
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| GatewayError::NotFound(id.clone()))
    }

    async fn get_ciphertext_handle(&self, id: &RecordId) -> Result<CiphertextHandle, GatewayError> {
        self.round_trip().await;
        self.ensure_reachable()?;
        self.state
            .lock()
            .await
            .entries
            .get(id)
            .map(|entry| entry.handle)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))
    }

    async fn is_available(&self) -> Result<bool, GatewayError> {
        self.round_trip().await;
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn create_record(
        &self,
        signer: &Address,
        record: NewRecord,
    ) -> Result<TxHash, GatewayError> {
        self.round_trip().await;
        self.ensure_reachable()?;
        self.ensure_signed()?;

        if !self
            .keys
            .verify_input(&self.context, signer, &record.ciphertext, &record.input_proof)
        {
            return Err(GatewayError::from_revert_reason("Invalid input proof"));
        }

        let mut state = self.state.lock().await;
        if state.entries.contains_key(&record.id) {
            return Err(GatewayError::DuplicateId(record.id));
        }

        let handle = handle_for(&record.ciphertext);
        let stored = Record {
            id: record.id.clone(),
            title: record.title,
            description: record.purpose,
            category: record.category,
            secondary: record.secondary,
            encrypted_value_ref: record.id.clone(),
            created_at: now_secs(),
            creator: signer.clone(),
            verified: false,
            revealed_value: 0,
        };

        state.order.push(record.id.clone());
        state.handles.insert(handle, record.id.clone());
        state.entries.insert(
            record.id.clone(),
            StoredRecord {
                record: stored,
                ciphertext: record.ciphertext,
                handle,
            },
        );
        let tx = state.mine(b"create", &record.id);

        info!("devnet: created {} (tx {}, block {})", record.id, tx, state.block);
        Ok(tx)
    }

    async fn submit_verification(
        &self,
        signer: &Address,
        id: &RecordId,
        encoded_cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> Result<TxHash, GatewayError> {
        self.round_trip().await;
        self.ensure_reachable()?;
        self.ensure_signed()?;

        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;

        if entry.record.verified {
            return Err(GatewayError::from_revert_reason(ALREADY_VERIFIED_REASON));
        }

        if !self
            .keys
            .verify_decryption(&self.context, &[entry.handle], encoded_cleartext, proof)
        {
            return Err(GatewayError::from_revert_reason("Invalid decryption proof"));
        }

        let value = decode_words(encoded_cleartext)
            .map_err(|e| GatewayError::from_revert_reason(e.to_string()))?
            .first()
            .copied()
            .ok_or_else(|| GatewayError::from_revert_reason("Empty cleartext"))?;

        entry.record.verified = true;
        entry.record.revealed_value = value;
        state.verification_writes += 1;
        let tx = state.mine(b"verify", id);

        debug!("devnet: {} verified by {} (tx {})", id, signer, tx);
        Ok(tx)
    }

    async fn wait_for_inclusion(&self, tx: &TxHash) -> Result<TxReceipt, GatewayError> {
        self.round_trip().await;
        if self.inclusion_stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.state
            .lock()
            .await
            .receipts
            .get(tx)
            .copied()
            .ok_or_else(|| GatewayError::Reverted(format!("unknown transaction {tx}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coprocessor::DevCoprocessor;
    use cloak_record::encode_words;

    fn setup() -> (DevCoprocessor, MemoryLedger, Address) {
        let coprocessor = DevCoprocessor::from_seed(&[3u8; 32]);
        let ledger = MemoryLedger::new(ContractAddress::new("0xc0ffee"), coprocessor.keys());
        (coprocessor, ledger, Address::from("0xA11CE00000000000000000000000000000000001"))
    }

    fn new_record(coprocessor: &DevCoprocessor, signer: &Address, id: &str, value: u64) -> NewRecord {
        let input = coprocessor
            .seal(&ContractAddress::new("0xc0ffee"), signer, value)
            .unwrap();
        NewRecord {
            id: RecordId::from(id),
            title: "Tuition".into(),
            ciphertext: input.ciphertext,
            input_proof: input.proof,
            category: 1,
            secondary: 0,
            purpose: "Alumni Support Request".into(),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let (coprocessor, ledger, alice) = setup();
        let tx = ledger
            .create_record(&alice, new_record(&coprocessor, &alice, "request-1", 500))
            .await
            .unwrap();
        let receipt = ledger.wait_for_inclusion(&tx).await.unwrap();
        assert_eq!(receipt.block, 1);

        let ids = ledger.enumerate_ids().await.unwrap();
        assert_eq!(ids, vec![RecordId::from("request-1")]);

        let record = ledger.get_record(&ids[0]).await.unwrap();
        assert_eq!(record.title, "Tuition");
        assert_eq!(record.description, "Alumni Support Request");
        assert_eq!(record.encrypted_value_ref, record.id);
        assert!(!record.verified);
        assert_eq!(record.revealed_value, 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (coprocessor, ledger, alice) = setup();
        ledger
            .create_record(&alice, new_record(&coprocessor, &alice, "request-1", 1))
            .await
            .unwrap();
        let err = ledger
            .create_record(&alice, new_record(&coprocessor, &alice, "request-1", 2))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::DuplicateId(RecordId::from("request-1")));
    }

    #[tokio::test]
    async fn test_input_proof_for_other_signer_rejected() {
        let (coprocessor, ledger, alice) = setup();
        let bob = Address::from("0xb0b0000000000000000000000000000000000002");
        let err = ledger
            .create_record(&bob, new_record(&coprocessor, &alice, "request-1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Reverted(_)));
        assert_eq!(ledger.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_verification_is_monotonic() {
        let (coprocessor, ledger, alice) = setup();
        let id = RecordId::from("request-1");
        ledger
            .create_record(&alice, new_record(&coprocessor, &alice, "request-1", 500))
            .await
            .unwrap();

        let handle = ledger.get_ciphertext_handle(&id).await.unwrap();
        let encoded = encode_words(&[500]);
        let proof = coprocessor.sign_decryption(ledger.context(), &[handle], &encoded);

        ledger
            .submit_verification(&alice, &id, &encoded, &proof)
            .await
            .unwrap();
        let err = ledger
            .submit_verification(&alice, &id, &encoded, &proof)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::AlreadyVerified);

        let record = ledger.get_record(&id).await.unwrap();
        assert!(record.verified);
        assert_eq!(record.revealed_value, 500);
        assert_eq!(ledger.verification_writes().await, 1);
    }

    #[tokio::test]
    async fn test_forged_decryption_proof_rejected() {
        let (coprocessor, ledger, alice) = setup();
        let id = RecordId::from("request-1");
        ledger
            .create_record(&alice, new_record(&coprocessor, &alice, "request-1", 500))
            .await
            .unwrap();

        let handle = ledger.get_ciphertext_handle(&id).await.unwrap();
        let proof = coprocessor.sign_decryption(ledger.context(), &[handle], &encode_words(&[500]));
        let err = ledger
            .submit_verification(&alice, &id, &encode_words(&[1]), &proof)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Reverted(_)));
        assert!(!ledger.get_record(&id).await.unwrap().verified);
    }

    #[tokio::test]
    async fn test_offline_ledger() {
        let (_, ledger, _) = setup();
        ledger.set_available(false);
        assert!(!ledger.is_available().await.unwrap());
        assert!(matches!(
            ledger.enumerate_ids().await,
            Err(GatewayError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_declining_wallet() {
        let (coprocessor, ledger, alice) = setup();
        ledger.set_declining(true);
        let err = ledger
            .create_record(&alice, new_record(&coprocessor, &alice, "request-1", 1))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::UserRejected);
    }
}
