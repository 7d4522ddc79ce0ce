use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("ledger error: {0}")]
    Ledger(#[from] tally_ledger::LedgerError),

    #[error("governance error: {0}")]
    Governance(#[from] tally_governance::GovernanceError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("poll task failed: {0}")]
    Task(String),

    #[error("no snapshot has been fetched yet")]
    NotReady,
}

impl WatcherError {
    /// Whether the next poll may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_retryable(),
            Self::Governance(e) => e.is_retryable(),
            Self::Io(_) | Self::Task(_) | Self::NotReady => true,
            Self::Metrics(_) | Self::Config(_) => false,
        }
    }
}
