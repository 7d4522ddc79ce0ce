use tally_ledger::LedgerError;
use tally_types::{ProposalId, TallyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("proposal {0} is not in the snapshot")]
    UnknownProposal(ProposalId),

    #[error("ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid governance parameters: {0}")]
    InvalidParams(#[from] TallyError),
}

impl GovernanceError {
    /// Whether the caller should simply try again on the next poll.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_retryable(),
            Self::UnknownProposal(_) | Self::InvalidParams(_) => false,
        }
    }
}
