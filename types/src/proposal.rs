//! Proposal and vote facts as read from the ledger.

use crate::address::AccountId;
use crate::amount::TokenAmount;
use crate::error::TallyError;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger-assigned proposal id. Ids are unique and monotonically assigned,
/// so they double as the ledger's creation order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProposalId(u64);

impl ProposalId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for ProposalId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TallyError::InvalidProposalId(s.to_string()))
    }
}

/// A proposal as recorded on the ledger.
///
/// Everything except `executed` (and `executed_at`) is immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: AccountId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub recipient: AccountId,
    /// Payout in smallest units.
    pub amount: TokenAmount,
    /// The ledger calls this "vote start"; voting opens immediately.
    pub created_at: Timestamp,
    /// `created_at` + the ledger's voting-period constant. Informational only.
    pub nominal_deadline: Timestamp,
    /// Legacy weighted tallies, superseded by the headcount model.
    #[serde(default)]
    pub yes_vote_weight: u128,
    #[serde(default)]
    pub no_vote_weight: u128,
    /// Monotonic false → true.
    #[serde(default)]
    pub executed: bool,
    /// When the payout was observed, if the reader knows it.
    #[serde(default)]
    pub executed_at: Option<Timestamp>,
}

impl Proposal {
    /// Placeholder slots carry the zero account as proposer and are not real proposals.
    pub fn is_placeholder(&self) -> bool {
        self.proposer.is_zero()
    }
}

/// A vote observed on the ledger: one per account per proposal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter: AccountId,
    pub proposal: ProposalId,
    /// Only supporting votes count towards headcount.
    #[serde(default = "default_support")]
    pub support: bool,
    pub timestamp: Timestamp,
}

fn default_support() -> bool {
    true
}
