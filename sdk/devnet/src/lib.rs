//! Cloak Devnet
//!
//! In-process stand-ins for the external services: a ledger that enforces
//! the request contract's rules and a coprocessor that plays both the
//! encryption SDK and the decryption key service. Not a real FHE scheme;
//! values are sealed with ChaCha20-Poly1305 under a shared network key and
//! proofs are ed25519 signatures.
//!
//! ```text
//! ┌──────────────┐  seal   ┌────────────────┐  open + sign  ┌──────────┐
//! │ DevEncryptor │────────▶│  MemoryLedger  │◀──────────────│  DevKms  │
//! └──────┬───────┘         └───────▲────────┘               └────┬─────┘
//!        │                         │ verify signatures           │
//!        └──────────── DevCoprocessor (network key, signers) ────┘
//! ```

pub mod coprocessor;
pub mod ledger;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use cloak_gateway::ContractAddress;

pub use coprocessor::{CoprocessorKeys, DevCoprocessor, handle_for};
pub use ledger::MemoryLedger;
pub use services::{DevEncryptor, DevKms};

/// Contract address the devnet uses unless told otherwise
pub const DEFAULT_CONTRACT: &str = "0x00000000000000000000000000000000c10a4c01";

/// A wired set of devnet services sharing one coprocessor
#[derive(Clone)]
pub struct Devnet {
    pub context: ContractAddress,
    pub coprocessor: Arc<DevCoprocessor>,
    pub ledger: Arc<MemoryLedger>,
    pub encryptor: Arc<DevEncryptor>,
    pub kms: Arc<DevKms>,
}

impl Devnet {
    pub fn new(context: ContractAddress) -> Self {
        Self::build(context, None)
    }

    /// Every ledger call sleeps for `latency` before touching state
    pub fn with_latency(context: ContractAddress, latency: Duration) -> Self {
        Self::build(context, Some(latency))
    }

    fn build(context: ContractAddress, latency: Option<Duration>) -> Self {
        let coprocessor = Arc::new(DevCoprocessor::generate());
        let mut ledger = MemoryLedger::new(context.clone(), coprocessor.keys());
        if let Some(latency) = latency {
            ledger = ledger.with_latency(latency);
        }
        let ledger = Arc::new(ledger);
        let encryptor = Arc::new(DevEncryptor::new(coprocessor.clone()));
        let kms = Arc::new(DevKms::new(coprocessor.clone(), ledger.clone()));

        Self {
            context,
            coprocessor,
            ledger,
            encryptor,
            kms,
        }
    }
}

impl Default for Devnet {
    fn default() -> Self {
        Self::new(ContractAddress::new(DEFAULT_CONTRACT))
    }
}
