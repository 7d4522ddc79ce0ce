//! Proposal lifecycle status.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use tally_types::{Proposal, ProposalId, Timestamp};

use crate::round::Round;

/// Derived lifecycle state of a proposal.
///
/// `Pending → Active → {EarlyWin | Succeeded | Defeated}`, and `Executed` is
/// reachable only from `EarlyWin` or `Succeeded`. Nothing moves backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalStatus {
    Pending,
    Active,
    EarlyWin,
    Succeeded,
    Defeated,
    Executed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::EarlyWin => "early-win",
            Self::Succeeded => "succeeded",
            Self::Defeated => "defeated",
            Self::Executed => "executed",
        }
    }

    /// Won its round, whether or not the payout has happened yet.
    pub fn is_winning(&self) -> bool {
        matches!(self, Self::EarlyWin | Self::Succeeded | Self::Executed)
    }

    /// Votes can no longer change the outcome.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending | Self::Active)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve `proposal`'s status within `round`, in priority order:
/// executed, the round's winner, open-round timing, then the headcount
/// comparison for rounds that closed without this proposal winning.
///
/// In a finished round the proposal(s) with the highest headcount succeed
/// (ties yield several), unless another proposal is the recognized winner or
/// nobody received any support at all.
pub fn status_of(
    proposal: &Proposal,
    round: &Round,
    headcounts: &BTreeMap<ProposalId, u32>,
    now: Timestamp,
) -> ProposalStatus {
    if proposal.executed {
        return ProposalStatus::Executed;
    }
    if round.early_winner == Some(proposal.id) {
        return ProposalStatus::EarlyWin;
    }
    if !round.is_finished {
        return if now >= proposal.created_at {
            ProposalStatus::Active
        } else {
            ProposalStatus::Pending
        };
    }
    if round.early_winner.is_some() {
        return ProposalStatus::Defeated;
    }

    let count_of = |id: &ProposalId| headcounts.get(id).copied().unwrap_or(0);
    let max = round.proposals.iter().map(count_of).max().unwrap_or(0);
    if max > 0 && count_of(&proposal.id) == max {
        ProposalStatus::Succeeded
    } else {
        ProposalStatus::Defeated
    }
}
