//! Process-local memory that outlives a single pass.
//!
//! [`WinnerRegistry`] remembers every early win the engine has recognized so a
//! later headcount change cannot reopen a round. [`LocalVoteLog`] remembers
//! votes this process submitted before the ledger reports them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use tally_types::{AccountId, ProposalId, Timestamp};

/// Recognized early winners and the instant each one closed its round.
///
/// Entries are only ever added. The one exception is [`WinnerRegistry::retain_known`],
/// which drops winners whose proposal vanished from the ledger (a reset).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRegistry {
    wins: BTreeMap<ProposalId, Timestamp>,
}

impl WinnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a win. Returns `false` (and keeps the first close time) if the
    /// proposal was already recorded.
    pub fn record(&mut self, proposal: ProposalId, closed_at: Timestamp) -> bool {
        if self.wins.contains_key(&proposal) {
            return false;
        }
        self.wins.insert(proposal, closed_at);
        true
    }

    pub fn contains(&self, proposal: ProposalId) -> bool {
        self.wins.contains_key(&proposal)
    }

    pub fn closed_at(&self, proposal: ProposalId) -> Option<Timestamp> {
        self.wins.get(&proposal).copied()
    }

    /// Winner to close-time map, as the partitioner consumes it.
    pub fn timestamps(&self) -> &BTreeMap<ProposalId, Timestamp> {
        &self.wins
    }

    pub fn len(&self) -> usize {
        self.wins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wins.is_empty()
    }

    /// Drop winners not in `known`, returning the ids that were purged.
    pub fn retain_known(&mut self, known: &BTreeSet<ProposalId>) -> Vec<ProposalId> {
        let stale: Vec<ProposalId> = self
            .wins
            .keys()
            .filter(|id| !known.contains(id))
            .copied()
            .collect();
        for id in &stale {
            self.wins.remove(id);
        }
        stale
    }
}

/// Votes this process submitted, keyed by proposal.
///
/// Advisory only: a hit may deny a vote before the ledger catches up, but a
/// miss never overrides the ledger's answer.
#[derive(Clone, Debug, Default)]
pub struct LocalVoteLog {
    votes: BTreeMap<ProposalId, BTreeSet<AccountId>>,
}

impl LocalVoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, proposal: ProposalId, voter: AccountId) {
        self.votes.entry(proposal).or_default().insert(voter);
    }

    pub fn has_voted(&self, proposal: ProposalId, voter: &AccountId) -> bool {
        self.votes
            .get(&proposal)
            .is_some_and(|voters| voters.contains(voter))
    }

    pub fn len(&self) -> usize {
        self.votes.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn retain_known(&mut self, known: &BTreeSet<ProposalId>) {
        self.votes.retain(|id, _| known.contains(id));
    }
}
