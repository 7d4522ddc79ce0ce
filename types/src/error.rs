//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for malformed ledger facts.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("invalid account id: {0}")]
    InvalidAccount(String),

    #[error("invalid proposal id: {0}")]
    InvalidProposalId(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParam { name: &'static str, reason: String },
}
