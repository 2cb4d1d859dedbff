//! Cleartext Word Codec
//!
//! Decrypted values travel to the ledger as a sequence of 32-byte
//! big-endian words, one per ciphertext handle, in handle order.

use crate::RecordError;

/// Width of one encoded cleartext word
pub const WORD_LEN: usize = 32;

/// Encode values as consecutive 32-byte big-endian words
pub fn encode_words(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * WORD_LEN);
    for value in values {
        let mut word = [0u8; WORD_LEN];
        word[WORD_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        out.extend_from_slice(&word);
    }
    out
}

/// Decode consecutive 32-byte words back into values.
///
/// Fails if the buffer is not word-aligned or a word carries bits above 64.
pub fn decode_words(bytes: &[u8]) -> Result<Vec<u64>, RecordError> {
    if bytes.len() % WORD_LEN != 0 {
        return Err(RecordError::MisalignedCleartext(bytes.len()));
    }

    bytes
        .chunks_exact(WORD_LEN)
        .enumerate()
        .map(|(index, word)| {
            let (high, low) = word.split_at(WORD_LEN - 8);
            if high.iter().any(|b| *b != 0) {
                return Err(RecordError::WordOverflow { index });
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(low);
            Ok(u64::from_be_bytes(buf))
        })
        .collect()
}
