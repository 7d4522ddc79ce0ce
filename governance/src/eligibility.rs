//! Vote eligibility gate.
//!
//! Checks run in a fixed order and the first failing check decides the
//! reason. Ownership and the account's own vote are asked of the ledger
//! directly; round facts come from the pass's computed rounds.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_ledger::{LedgerError, LedgerReader, Snapshot};
use tally_types::{AccountId, ProposalId};

use crate::registry::LocalVoteLog;
use crate::round::Round;

/// Why a vote is (or is not) allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    Eligible,
    InsufficientOwnership,
    ProposalNotFound,
    AlreadyVoted,
    ProposalWon,
    RoundClosed,
    AlreadyVotedInRound,
}

impl EligibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::InsufficientOwnership => "insufficient_ownership",
            Self::ProposalNotFound => "proposal_not_found",
            Self::AlreadyVoted => "already_voted",
            Self::ProposalWon => "proposal_won",
            Self::RoundClosed => "round_closed",
            Self::AlreadyVotedInRound => "already_voted_in_round",
        }
    }
}

impl fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an eligibility check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub allowed: bool,
    pub reason: EligibilityReason,
    /// The account's ownership share as read for this check.
    pub ownership_bps: u32,
}

impl Eligibility {
    fn allow(ownership_bps: u32) -> Self {
        Self {
            allowed: true,
            reason: EligibilityReason::Eligible,
            ownership_bps,
        }
    }

    fn deny(reason: EligibilityReason, ownership_bps: u32) -> Self {
        Self {
            allowed: false,
            reason,
            ownership_bps,
        }
    }
}

/// Everything a single eligibility check needs, borrowed from one pass.
pub struct EligibilityGate<'a> {
    pub rounds: &'a [Round],
    pub snapshot: &'a Snapshot,
    pub reader: &'a dyn LedgerReader,
    pub local_votes: &'a LocalVoteLog,
    pub min_ownership_bps: u32,
}

impl EligibilityGate<'_> {
    /// Decide whether `account` may vote on `proposal`.
    ///
    /// Order: ownership floor, proposal known, own prior vote, proposal
    /// already won, round closed, a prior vote on a sibling in the same round.
    /// Ledger read failures propagate; the caller treats them as retryable.
    pub fn can_vote(&self, account: &AccountId, proposal: ProposalId) -> Result<Eligibility, LedgerError> {
        let bps = self.reader.ownership_bps(account)?;
        if bps < self.min_ownership_bps {
            return Ok(Eligibility::deny(EligibilityReason::InsufficientOwnership, bps));
        }

        let (Some(target), Some(round)) = (
            self.snapshot.proposal(proposal),
            self.rounds.iter().find(|r| r.contains(proposal)),
        ) else {
            return Ok(Eligibility::deny(EligibilityReason::ProposalNotFound, bps));
        };

        if self.local_votes.has_voted(proposal, account) {
            debug!(%account, %proposal, "vote pre-empted by local vote log");
            return Ok(Eligibility::deny(EligibilityReason::AlreadyVoted, bps));
        }
        if self.reader.has_voted(proposal, account)? {
            return Ok(Eligibility::deny(EligibilityReason::AlreadyVoted, bps));
        }

        if target.executed || round.early_winner == Some(proposal) {
            return Ok(Eligibility::deny(EligibilityReason::ProposalWon, bps));
        }
        if round.is_finished {
            return Ok(Eligibility::deny(EligibilityReason::RoundClosed, bps));
        }

        for sibling in round.proposals.iter().filter(|&&id| id != proposal) {
            if self.local_votes.has_voted(*sibling, account) || self.reader.has_voted(*sibling, account)? {
                return Ok(Eligibility::deny(EligibilityReason::AlreadyVotedInRound, bps));
            }
        }

        Ok(Eligibility::allow(bps))
    }
}
