use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("category must be a positive selector, got {0}")]
    InvalidCategory(u8),

    #[error("cleartext length {0} is not a multiple of 32")]
    MisalignedCleartext(usize),

    #[error("cleartext word {index} does not fit in 64 bits")]
    WordOverflow { index: usize },
}

/// Record identifier chosen by the creator at submission time.
///
/// The same value doubles as the locator for the record's ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Wallet identity (hex address).
///
/// Addresses arrive from wallets in mixed checksum casing, so identity
/// comparisons go through [`Address::same_as`] rather than `==`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Derive a development address from arbitrary seed bytes.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive identity comparison
    pub fn same_as(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// Lowercase form used when an address is bound into signed payloads
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

/// Public request category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Category(u8);

impl Category {
    /// Offer of funds to the community
    pub const DONATION: Category = Category(1);
    /// Request for assistance
    pub const ASSISTANCE: Category = Category(2);

    /// Zero is the "nothing selected" value of the intake form and is never stored.
    pub fn new(selector: u8) -> Result<Self, RecordError> {
        if selector == 0 {
            return Err(RecordError::InvalidCategory(selector));
        }
        Ok(Self(selector))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        label_for(self.0)
    }
}

impl TryFrom<u8> for Category {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Category> for u8 {
    fn from(category: Category) -> Self {
        category.0
    }
}

fn label_for(selector: u8) -> &'static str {
    match selector {
        1 => "donation",
        2 => "assistance",
        _ => "other",
    }
}

/// A confidential request as read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    /// Raw category slot; the ledger does not police its range
    pub category: u8,
    /// Secondary public slot, zero for every request this client submits
    pub secondary: u32,
    /// Ciphertext locator (always equal to `id`)
    pub encrypted_value_ref: RecordId,
    /// Ledger timestamp in seconds
    pub created_at: u64,
    pub creator: Address,
    pub verified: bool,
    /// Only meaningful once `verified` is set
    pub revealed_value: u64,
}

impl Record {
    /// The ledger-confirmed amount, if the record has been verified.
    pub fn confirmed_value(&self) -> Option<u64> {
        self.verified.then_some(self.revealed_value)
    }

    pub fn category_label(&self) -> &'static str {
        label_for(self.category)
    }

    pub fn is_created_by(&self, identity: &Address) -> bool {
        self.creator.same_as(identity)
    }

    /// Case-insensitive substring match over title and description.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}
