//! Devnet encryption and decryption services

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use cloak_gateway::{
    CiphertextHandle, ContractAddress, DecryptionVerifier, EncryptedInput, EncryptionService,
    GatewayError, ProofSubmitter, VerifiedDecryption,
};
use cloak_record::{Address, encode_words};

use crate::coprocessor::DevCoprocessor;
use crate::ledger::MemoryLedger;

/// Client-side encryptor backed by the devnet coprocessor
pub struct DevEncryptor {
    coprocessor: Arc<DevCoprocessor>,
    initialized: AtomicBool,
}

impl DevEncryptor {
    pub fn new(coprocessor: Arc<DevCoprocessor>) -> Self {
        Self {
            coprocessor,
            initialized: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EncryptionService for DevEncryptor {
    async fn initialize(&self) -> Result<(), GatewayError> {
        tokio::task::yield_now().await;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn encrypt(
        &self,
        context: &ContractAddress,
        requester: &Address,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        if !self.is_initialized() {
            return Err(GatewayError::NotInitialized);
        }
        tokio::task::yield_now().await;
        self.coprocessor.seal(context, requester, value)
    }
}

/// Decryption key service: opens ledger ciphertexts and signs the result
pub struct DevKms {
    coprocessor: Arc<DevCoprocessor>,
    ledger: Arc<MemoryLedger>,
}

impl DevKms {
    pub fn new(coprocessor: Arc<DevCoprocessor>, ledger: Arc<MemoryLedger>) -> Self {
        Self { coprocessor, ledger }
    }
}

#[async_trait]
impl DecryptionVerifier for DevKms {
    async fn verify_decryption(
        &self,
        handles: &[CiphertextHandle],
        context: &ContractAddress,
        submitter: &dyn ProofSubmitter,
    ) -> Result<VerifiedDecryption, GatewayError> {
        let mut values = Vec::with_capacity(handles.len());
        for handle in handles {
            let ciphertext = self
                .ledger
                .ciphertext_for(handle)
                .await
                .ok_or_else(|| GatewayError::Decryption(format!("unknown handle {handle}")))?;
            values.push(self.coprocessor.open(context, &ciphertext)?);
        }

        let encoded = encode_words(&values);
        let proof = self.coprocessor.sign_decryption(context, handles, &encoded);

        // Proof goes straight to the ledger; submitter errors pass through untouched
        let receipt = submitter.submit(&encoded, &proof).await?;
        debug!(
            "devnet kms: {} handle(s) verified in block {}",
            handles.len(),
            receipt.block
        );

        let clear_values: HashMap<CiphertextHandle, u64> =
            handles.iter().copied().zip(values).collect();
        Ok(VerifiedDecryption {
            clear_values,
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Devnet;
    use cloak_gateway::{DecryptionProof, LedgerGateway, NewRecord, TxReceipt};
    use cloak_record::RecordId;
    use std::sync::Mutex;

    struct RecordingSubmitter {
        seen: Mutex<Vec<Vec<u8>>>,
        fail_with: Option<GatewayError>,
    }

    #[async_trait]
    impl ProofSubmitter for RecordingSubmitter {
        async fn submit(
            &self,
            encoded_cleartext: &[u8],
            _proof: &DecryptionProof,
        ) -> Result<TxReceipt, GatewayError> {
            self.seen.lock().unwrap().push(encoded_cleartext.to_vec());
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(TxReceipt {
                    tx_hash: cloak_gateway::TxHash([0u8; 32]),
                    block: 7,
                }),
            }
        }
    }

    async fn seeded(devnet: &Devnet, alice: &Address) -> CiphertextHandle {
        devnet.encryptor.initialize().await.unwrap();
        let input = devnet
            .encryptor
            .encrypt(&devnet.context, alice, 500)
            .await
            .unwrap();
        devnet
            .ledger
            .create_record(
                alice,
                NewRecord {
                    id: RecordId::from("request-1"),
                    title: "Tuition".into(),
                    ciphertext: input.ciphertext,
                    input_proof: input.proof,
                    category: 1,
                    secondary: 0,
                    purpose: "Alumni Support Request".into(),
                },
            )
            .await
            .unwrap();
        devnet
            .ledger
            .get_ciphertext_handle(&RecordId::from("request-1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_encrypt_requires_initialization() {
        let devnet = Devnet::default();
        let alice = Address::from("0xa11ce00000000000000000000000000000000001");
        let err = devnet
            .encryptor
            .encrypt(&devnet.context, &alice, 1)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::NotInitialized);
    }

    #[tokio::test]
    async fn test_kms_invokes_submitter_with_encoded_cleartext() {
        let devnet = Devnet::default();
        let alice = Address::from("0xa11ce00000000000000000000000000000000001");
        let handle = seeded(&devnet, &alice).await;

        let submitter = RecordingSubmitter {
            seen: Mutex::new(Vec::new()),
            fail_with: None,
        };
        let result = devnet
            .kms
            .verify_decryption(&[handle], &devnet.context, &submitter)
            .await
            .unwrap();

        assert_eq!(result.value_for(&handle), Some(500));
        assert_eq!(result.receipt.block, 7);
        assert_eq!(submitter.seen.lock().unwrap().as_slice(), &[encode_words(&[500])]);
    }

    #[tokio::test]
    async fn test_kms_propagates_submitter_error() {
        let devnet = Devnet::default();
        let alice = Address::from("0xa11ce00000000000000000000000000000000001");
        let handle = seeded(&devnet, &alice).await;

        let submitter = RecordingSubmitter {
            seen: Mutex::new(Vec::new()),
            fail_with: Some(GatewayError::AlreadyVerified),
        };
        let err = devnet
            .kms
            .verify_decryption(&[handle], &devnet.context, &submitter)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::AlreadyVerified);
    }

    #[tokio::test]
    async fn test_kms_unknown_handle() {
        let devnet = Devnet::default();
        let submitter = RecordingSubmitter {
            seen: Mutex::new(Vec::new()),
            fail_with: None,
        };
        let err = devnet
            .kms
            .verify_decryption(&[CiphertextHandle([1u8; 32])], &devnet.context, &submitter)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Decryption(_)));
        assert!(submitter.seen.lock().unwrap().is_empty());
    }
}
