//! Development Coprocessor
//!
//! Holds the network key used to seal amounts and the two signing keys
//! standing in for the input-proof and decryption-proof systems.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;

use cloak_gateway::{
    CiphertextHandle, ContractAddress, DecryptionProof, EncryptedInput, GatewayError,
};
use cloak_record::Address;

const NONCE_LEN: usize = 12;
const INPUT_PROOF_DOMAIN: &[u8] = b"cloak-devnet-input-v1";
const DECRYPTION_PROOF_DOMAIN: &[u8] = b"cloak-devnet-decryption-v1";

/// Locator the ledger assigns to a stored ciphertext
pub fn handle_for(ciphertext: &[u8]) -> CiphertextHandle {
    CiphertextHandle(*blake3::hash(ciphertext).as_bytes())
}

pub struct DevCoprocessor {
    network_key: [u8; 32],
    input_signer: SigningKey,
    kms_signer: SigningKey,
}

impl DevCoprocessor {
    /// Fresh random keys
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Deterministic keys derived from `seed`
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let network_key = blake3::derive_key("cloak devnet network key", seed);
        let input_seed = blake3::derive_key("cloak devnet input signer", seed);
        let kms_seed = blake3::derive_key("cloak devnet kms signer", seed);

        Self {
            network_key,
            input_signer: SigningKey::from_bytes(&input_seed),
            kms_signer: SigningKey::from_bytes(&kms_seed),
        }
    }

    /// Public half, handed to the ledger for proof checks
    pub fn keys(&self) -> CoprocessorKeys {
        CoprocessorKeys {
            input: self.input_signer.verifying_key(),
            kms: self.kms_signer.verifying_key(),
        }
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305, GatewayError> {
        ChaCha20Poly1305::new_from_slice(&self.network_key)
            .map_err(|_| GatewayError::Encryption("invalid network key".into()))
    }

    /// Seal `value` for `context` and sign the input proof for `requester`.
    ///
    /// Output layout: `[nonce (12B) || ciphertext]`.
    pub fn seal(
        &self,
        context: &ContractAddress,
        requester: &Address,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .cipher()?
            .encrypt(
                nonce,
                Payload {
                    msg: &value.to_be_bytes(),
                    aad: context.as_str().as_bytes(),
                },
            )
            .map_err(|_| GatewayError::Encryption("seal failure".into()))?;

        let mut ciphertext = Vec::with_capacity(NONCE_LEN + sealed.len());
        ciphertext.extend_from_slice(&nonce_bytes);
        ciphertext.extend_from_slice(&sealed);

        let message = input_message(context, requester, &ciphertext);
        let proof = self.input_signer.sign(&message).to_bytes().to_vec();

        Ok(EncryptedInput { ciphertext, proof })
    }

    /// Recover the value sealed by [`DevCoprocessor::seal`]
    pub fn open(&self, context: &ContractAddress, ciphertext: &[u8]) -> Result<u64, GatewayError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(GatewayError::Decryption("ciphertext too short".into()));
        }
        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);

        let plaintext = self
            .cipher()?
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: sealed,
                    aad: context.as_str().as_bytes(),
                },
            )
            .map_err(|_| GatewayError::Decryption("bad key or mac".into()))?;

        let bytes: [u8; 8] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| GatewayError::Decryption("unexpected plaintext width".into()))?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Sign the decryption result for `handles`
    pub fn sign_decryption(
        &self,
        context: &ContractAddress,
        handles: &[CiphertextHandle],
        encoded_cleartext: &[u8],
    ) -> DecryptionProof {
        let message = decryption_message(context, handles, encoded_cleartext);
        DecryptionProof(self.kms_signer.sign(&message).to_bytes().to_vec())
    }
}

/// Verifying keys for both proof systems
#[derive(Debug, Clone, Copy)]
pub struct CoprocessorKeys {
    pub input: VerifyingKey,
    pub kms: VerifyingKey,
}

impl CoprocessorKeys {
    pub fn verify_input(
        &self,
        context: &ContractAddress,
        requester: &Address,
        ciphertext: &[u8],
        proof: &[u8],
    ) -> bool {
        let message = input_message(context, requester, ciphertext);
        verify(&self.input, &message, proof)
    }

    pub fn verify_decryption(
        &self,
        context: &ContractAddress,
        handles: &[CiphertextHandle],
        encoded_cleartext: &[u8],
        proof: &DecryptionProof,
    ) -> bool {
        let message = decryption_message(context, handles, encoded_cleartext);
        verify(&self.kms, &message, &proof.0)
    }
}

fn verify(key: &VerifyingKey, message: &[u8], proof: &[u8]) -> bool {
    Signature::from_slice(proof)
        .map(|sig| key.verify(message, &sig).is_ok())
        .unwrap_or(false)
}

fn input_message(context: &ContractAddress, requester: &Address, ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(INPUT_PROOF_DOMAIN);
    hasher.update(context.as_str().to_ascii_lowercase().as_bytes());
    hasher.update(requester.normalized().as_bytes());
    hasher.update(ciphertext);
    *hasher.finalize().as_bytes()
}

fn decryption_message(
    context: &ContractAddress,
    handles: &[CiphertextHandle],
    encoded_cleartext: &[u8],
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DECRYPTION_PROOF_DOMAIN);
    hasher.update(context.as_str().to_ascii_lowercase().as_bytes());
    for handle in handles {
        hasher.update(&handle.0);
    }
    hasher.update(encoded_cleartext);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ContractAddress {
        ContractAddress::new("0x00000000000000000000000000000000c10a4c01")
    }

    #[test]
    fn test_seal_open() {
        let coprocessor = DevCoprocessor::generate();
        let alice = Address::from("0xA11CE00000000000000000000000000000000001");

        let input = coprocessor.seal(&context(), &alice, 500).unwrap();
        assert_eq!(coprocessor.open(&context(), &input.ciphertext).unwrap(), 500);
    }

    #[test]
    fn test_open_under_other_context_fails() {
        let coprocessor = DevCoprocessor::generate();
        let alice = Address::from("0xa11ce00000000000000000000000000000000001");
        let input = coprocessor.seal(&context(), &alice, 42).unwrap();

        let other = ContractAddress::new("0xdead");
        assert!(coprocessor.open(&other, &input.ciphertext).is_err());
    }

    #[test]
    fn test_input_proof_bound_to_requester() {
        let coprocessor = DevCoprocessor::generate();
        let keys = coprocessor.keys();
        let alice = Address::from("0xA11CE00000000000000000000000000000000001");
        let mallory = Address::from("0x3a11000000000000000000000000000000000001");

        let input = coprocessor.seal(&context(), &alice, 7).unwrap();

        // Checksum casing of the requester must not matter
        let alice_lower = Address::new(alice.normalized());
        assert!(keys.verify_input(&context(), &alice_lower, &input.ciphertext, &input.proof));
        assert!(!keys.verify_input(&context(), &mallory, &input.ciphertext, &input.proof));
    }

    #[test]
    fn test_decryption_proof_bound_to_cleartext() {
        let coprocessor = DevCoprocessor::from_seed(&[9u8; 32]);
        let keys = coprocessor.keys();
        let handle = handle_for(b"ciphertext");
        let encoded = cloak_record::encode_words(&[500]);

        let proof = coprocessor.sign_decryption(&context(), &[handle], &encoded);
        assert!(keys.verify_decryption(&context(), &[handle], &encoded, &proof));

        let forged = cloak_record::encode_words(&[501]);
        assert!(!keys.verify_decryption(&context(), &[handle], &forged, &proof));
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = DevCoprocessor::from_seed(&[1u8; 32]).keys();
        let b = DevCoprocessor::from_seed(&[1u8; 32]).keys();
        assert_eq!(a.input, b.input);
        assert_eq!(a.kms, b.kms);
    }
}
