//! Cloak Records
//!
//! Public shape of a confidential request as the ledger stores it, plus the
//! cleartext word codec shared by the decryption and verification paths.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Record                              │
//! │                                                              │
//! │  public:  id · title · description · category · creator      │
//! │           created_at · secondary slot                        │
//! │  sealed:  ciphertext (located by encrypted_value_ref == id)  │
//! │  reveal:  verified ──▶ revealed_value (ledger-confirmed)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
mod record;

pub use codec::{WORD_LEN, decode_words, encode_words};
pub use record::{Address, Category, Record, RecordError, RecordId};
