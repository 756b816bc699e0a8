//! Document identifier generation.
//!
//! Identifiers are 20 random alphanumeric characters, the same shape the
//! managed document stores hand out for auto-generated keys.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};

/// Length of a generated document identifier.
pub const DOCUMENT_ID_LEN: usize = 20;

/// Generate a new random document identifier.
pub fn new_document_id() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}
