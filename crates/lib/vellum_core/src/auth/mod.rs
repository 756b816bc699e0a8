//! Token issuance and verification.
//!
//! Internal access tokens are HMAC-signed with a shared secret. Identity
//! provider tokens are RSA-signed and verified against the provider's
//! published key set, fetched once per process.

pub mod jwks;
pub mod jwt;

use std::fmt;

use thiserror::Error;

pub use jwks::JwksCache;
pub use jwt::{Claims, JwtHelper, LEEWAY_SECS};

/// Message returned to callers for every rejected token.
pub const GENERIC_REJECTION: &str = "Could not validate credentials";

/// Why a token was rejected. Logged, never returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Expired,
    InvalidAudience,
    InvalidIssuer,
    InvalidSignature,
    MissingClaim(String),
    MissingKeyId,
    UnknownKey,
    Immature,
    Malformed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Expired => f.write_str("expired"),
            RejectReason::InvalidAudience => f.write_str("bad_audience"),
            RejectReason::InvalidIssuer => f.write_str("bad_issuer"),
            RejectReason::InvalidSignature => f.write_str("bad_signature"),
            RejectReason::MissingClaim(claim) => write!(f, "missing_claim:{claim}"),
            RejectReason::MissingKeyId => f.write_str("missing_kid"),
            RejectReason::UnknownKey => f.write_str("unknown_key"),
            RejectReason::Immature => f.write_str("not_yet_valid"),
            RejectReason::Malformed => f.write_str("malformed"),
        }
    }
}

/// A token failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token rejected ({reason}): {detail}")]
pub struct TokenRejection {
    pub reason: RejectReason,
    pub detail: String,
}

impl TokenRejection {
    pub fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// Text safe to hand back to the caller.
    pub fn public_message(&self) -> &'static str {
        GENERIC_REJECTION
    }
}

/// The provider key set could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySetError {
    #[error("key set request timed out")]
    Timeout,

    #[error("key set endpoint returned HTTP {0}")]
    Status(u16),

    #[error("key set request failed: {0}")]
    Transport(String),

    #[error("key set response is malformed: {0}")]
    Malformed(String),
}

/// Errors from [`JwtHelper`].
#[derive(Debug, Clone, Error)]
pub enum JwtError {
    #[error(transparent)]
    Rejected(#[from] TokenRejection),

    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(#[from] KeySetError),

    #[error("Token signing failed: {0}")]
    Signing(String),
}
