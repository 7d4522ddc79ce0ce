//! Investment rounds and the partitioner that folds proposals into them.
//!
//! A round opens with its first proposal and nominally lasts
//! `round_duration_secs`. It closes early the instant a winner is
//! recognized. Every proposal created at or before the round's effective
//! end joins it; the first proposal created after that end opens the next
//! round. Rounds are never stored: they are recomputed from the snapshot on
//! every pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_types::{Proposal, ProposalId, Timestamp};

/// One investment round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based sequence number.
    pub id: u32,
    /// `created_at` of the round's first proposal.
    pub start_time: Timestamp,
    /// `start_time + round_duration_secs`.
    pub nominal_end_time: Timestamp,
    /// Member proposals ordered by `(created_at, id)`.
    pub proposals: Vec<ProposalId>,
    pub is_finished: bool,
    /// The round's recognized winner. Set at most once.
    pub early_winner: Option<ProposalId>,
    /// When the round truly closed. Always `<= nominal_end_time`.
    pub actual_end_time: Option<Timestamp>,
}

impl Round {
    fn open(id: u32, start_time: Timestamp, duration_secs: u64) -> Self {
        Self {
            id,
            start_time,
            nominal_end_time: start_time.plus_secs(duration_secs),
            proposals: Vec::new(),
            is_finished: false,
            early_winner: None,
            actual_end_time: None,
        }
    }

    /// The last instant a proposal can be created and still join this round.
    pub fn effective_end(&self) -> Timestamp {
        self.actual_end_time.unwrap_or(self.nominal_end_time)
    }

    pub fn contains(&self, proposal: ProposalId) -> bool {
        self.proposals.contains(&proposal)
    }

    pub fn is_open(&self) -> bool {
        !self.is_finished
    }

    /// Closed before its nominal deadline because a winner was recognized.
    pub fn closed_early(&self) -> bool {
        self.is_finished
            && self.early_winner.is_some()
            && self.actual_end_time.is_some_and(|end| end < self.nominal_end_time)
    }

    fn close_naturally(&mut self) {
        self.is_finished = true;
        self.actual_end_time = Some(self.actual_end_time.unwrap_or(self.nominal_end_time));
    }

    fn close_with_winner(&mut self, winner: ProposalId, at: Timestamp) {
        self.early_winner = Some(winner);
        self.actual_end_time = Some(at);
        self.is_finished = true;
    }
}

/// Fold proposals into rounds.
///
/// `win_times` maps recognized winners to the instant they won. Executed
/// proposals are winners too; when one is missing from `win_times` its close
/// time is `executed_at`, falling back to `now`. Close times are clamped to
/// `[winner.created_at, nominal_end_time]`.
///
/// Proposals are processed in `(created_at, id)` order, so two proposals
/// created in the same second are ordered by ledger assignment. A proposal
/// created exactly at a round's effective end belongs to that round.
pub fn partition(
    proposals: &[Proposal],
    win_times: &BTreeMap<ProposalId, Timestamp>,
    round_duration_secs: u64,
    now: Timestamp,
) -> Vec<Round> {
    let mut sorted: Vec<&Proposal> = proposals.iter().collect();
    sorted.sort_by_key(|p| (p.created_at, p.id));

    let mut rounds: Vec<Round> = Vec::new();

    for proposal in sorted {
        let needs_new_round = match rounds.last() {
            None => true,
            Some(current) => proposal.created_at > current.effective_end(),
        };
        if needs_new_round {
            if let Some(current) = rounds.last_mut() {
                if !current.is_finished {
                    current.close_naturally();
                }
            }
            let id = rounds.len() as u32 + 1;
            rounds.push(Round::open(id, proposal.created_at, round_duration_secs));
        }

        let Some(current) = rounds.last_mut() else {
            continue;
        };
        current.proposals.push(proposal.id);

        let recognized = win_times.get(&proposal.id).copied();
        let is_winner = recognized.is_some() || proposal.executed;
        if is_winner && current.early_winner.is_none() {
            let raw = recognized.or(proposal.executed_at).unwrap_or(now);
            let at = raw.max(proposal.created_at).min(current.nominal_end_time);
            debug!(round = current.id, winner = %proposal.id, closed_at = %at, "round closed by winner");
            current.close_with_winner(proposal.id, at);
        }
    }

    for round in rounds.iter_mut() {
        if !round.is_finished && now > round.nominal_end_time {
            debug!(round = round.id, "round reached its nominal end");
            round.close_naturally();
        }
    }

    rounds
}
