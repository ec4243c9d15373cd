//! Fixed-length sequence preparation for the classifier

use crate::constants::MAX_SEQUENCE_LENGTH;
use crate::services::tokenizer::Tokenizer;

/// Truncate or zero-pad to exactly `len` entries, both at the tail.
pub fn pad_post(mut encoded: Vec<u32>, len: usize) -> Vec<u32> {
    encoded.truncate(len);
    encoded.resize(len, 0);
    encoded
}

/// Encode `text` as a single sequence and bring it to `MAX_SEQUENCE_LENGTH`.
pub fn normalize(tokenizer: &dyn Tokenizer, text: &str) -> Vec<u32> {
    pad_post(tokenizer.encode(text), MAX_SEQUENCE_LENGTH)
}
