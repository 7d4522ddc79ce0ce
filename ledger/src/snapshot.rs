//! Ledger snapshots: one pass worth of ledger facts.
//!
//! A snapshot is not atomic: each field comes from a separate read and the
//! reads may reflect different ledger heights. The engine must stay
//! correct under any such interleaving; the snapshot only promises that
//! every field is internally well-formed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tally_types::{AccountId, HolderBalance, Proposal, ProposalId, Timestamp, TokenAmount, VoteRecord};

use crate::{LedgerError, LedgerReader};

/// Which read a [`ReadFailure`] refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadTarget {
    Headcount(ProposalId),
    VoteEvents,
    Holders,
    CirculatingSupply,
}

/// A read that failed while building a snapshot. The affected field holds
/// the previous snapshot's value, if there was one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFailure {
    pub target: ReadTarget,
    pub error: String,
}

/// Ledger facts gathered for one recomputation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the reads were issued.
    pub taken_at: Timestamp,
    /// Real proposals, sorted by id. Placeholders are filtered out.
    pub proposals: Vec<Proposal>,
    /// Ledger-reported supporter headcounts. Missing = never read successfully.
    #[serde(default)]
    pub headcounts: BTreeMap<ProposalId, u32>,
    /// Vote events observed by the reader.
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    #[serde(default)]
    pub holders: Vec<HolderBalance>,
    #[serde(default)]
    pub circulating_supply: TokenAmount,
    #[serde(skip)]
    pub read_failures: Vec<ReadFailure>,
}

impl Snapshot {
    /// A snapshot holding only `proposals` (placeholders dropped, sorted by id).
    pub fn new(mut proposals: Vec<Proposal>, taken_at: Timestamp) -> Self {
        proposals.retain(|p| !p.is_placeholder());
        proposals.sort_by_key(|p| p.id);
        proposals.dedup_by_key(|p| p.id);
        Self {
            taken_at,
            proposals,
            ..Self::default()
        }
    }

    pub fn with_headcount(mut self, proposal: ProposalId, count: u32) -> Self {
        self.headcounts.insert(proposal, count);
        self
    }

    pub fn with_holders(mut self, holders: Vec<HolderBalance>, circulating: TokenAmount) -> Self {
        self.holders = holders;
        self.circulating_supply = circulating;
        self
    }

    pub fn with_votes(mut self, votes: Vec<VoteRecord>) -> Self {
        self.votes = votes;
        self
    }

    pub fn proposal(&self, id: ProposalId) -> Option<&Proposal> {
        self.proposals
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|idx| &self.proposals[idx])
    }

    pub fn proposal_ids(&self) -> BTreeSet<ProposalId> {
        self.proposals.iter().map(|p| p.id).collect()
    }

    /// Distinct accounts observed supporting `proposal`.
    pub fn voter_set(&self, proposal: ProposalId) -> BTreeSet<AccountId> {
        self.votes
            .iter()
            .filter(|v| v.proposal == proposal && v.support)
            .map(|v| v.voter)
            .collect()
    }

    /// Supporter headcount: the larger of the ledger's figure and the locally
    /// observed voter set, since either may lag the other. `None` when neither
    /// source knows anything about the proposal.
    pub fn headcount(&self, proposal: ProposalId) -> Option<u32> {
        let observed = self.voter_set(proposal).len() as u32;
        match self.headcounts.get(&proposal) {
            Some(&reported) => Some(reported.max(observed)),
            None if observed > 0 => Some(observed),
            None => None,
        }
    }

    /// [`Snapshot::headcount`] for every proposal that has one.
    pub fn effective_headcounts(&self) -> BTreeMap<ProposalId, u32> {
        self.proposals
            .iter()
            .filter_map(|p| self.headcount(p.id).map(|c| (p.id, c)))
            .collect()
    }

    /// Timestamp of the `n`-th distinct supporter's vote (1-based), if observed.
    pub fn nth_supporter_at(&self, proposal: ProposalId, n: u32) -> Option<Timestamp> {
        if n == 0 {
            return None;
        }
        let mut supporting: Vec<&VoteRecord> = self
            .votes
            .iter()
            .filter(|v| v.proposal == proposal && v.support)
            .collect();
        supporting.sort_by_key(|v| (v.timestamp, v.voter));
        let mut seen = BTreeSet::new();
        supporting
            .into_iter()
            .filter(|v| seen.insert(v.voter))
            .nth(n as usize - 1)
            .map(|v| v.timestamp)
    }

    /// Ownership share of `account` from the holder list, in basis points.
    pub fn ownership_bps(&self, account: &AccountId) -> u32 {
        self.holders
            .iter()
            .find(|h| &h.account == account)
            .map(|h| h.ownership_bps(self.circulating_supply))
            .unwrap_or(0)
    }

    /// Holders whose share meets `min_bps`.
    pub fn eligible_holder_count(&self, min_bps: u32) -> u32 {
        self.holders
            .iter()
            .filter(|h| h.ownership_bps(self.circulating_supply) >= min_bps)
            .count() as u32
    }

    /// Holders sorted by balance, largest first (ties by account id).
    pub fn holders_by_balance(&self) -> Vec<&HolderBalance> {
        let mut sorted: Vec<&HolderBalance> = self.holders.iter().collect();
        sorted.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.account.cmp(&b.account)));
        sorted
    }

    /// Whether every read in this pass succeeded.
    pub fn is_complete(&self) -> bool {
        self.read_failures.is_empty()
    }
}

/// Build a snapshot from the ledger.
///
/// Only the proposal list is mandatory; without it there is nothing to
/// compute and the error is returned. Every other read that fails is
/// recorded in [`Snapshot::read_failures`] and its field falls back to
/// `previous` (headcounts only grow on an append-only ledger, so a stale
/// value is a safe lower bound).
pub fn fetch_snapshot(
    reader: &dyn LedgerReader,
    previous: Option<&Snapshot>,
    now: Timestamp,
) -> Result<Snapshot, LedgerError> {
    let listed = reader.list_proposals()?;
    let total = listed.len();
    let mut snapshot = Snapshot::new(listed, now);
    if snapshot.proposals.len() != total {
        debug!(
            skipped = total - snapshot.proposals.len(),
            "filtered placeholder proposal slots"
        );
    }

    for proposal in &snapshot.proposals {
        match reader.headcount(proposal.id) {
            Ok(count) => {
                snapshot.headcounts.insert(proposal.id, count);
            }
            Err(e) => {
                warn!(proposal = %proposal.id, error = %e, "headcount read failed");
                if let Some(prev) = previous.and_then(|p| p.headcounts.get(&proposal.id)) {
                    snapshot.headcounts.insert(proposal.id, *prev);
                }
                snapshot.read_failures.push(ReadFailure {
                    target: ReadTarget::Headcount(proposal.id),
                    error: e.to_string(),
                });
            }
        }
    }

    match reader.vote_events() {
        Ok(votes) => snapshot.votes = votes,
        Err(e) => {
            warn!(error = %e, "vote event read failed");
            if let Some(prev) = previous {
                snapshot.votes = prev.votes.clone();
            }
            snapshot.read_failures.push(ReadFailure {
                target: ReadTarget::VoteEvents,
                error: e.to_string(),
            });
        }
    }

    match reader.list_holders() {
        Ok(holders) => snapshot.holders = holders,
        Err(e) => {
            warn!(error = %e, "holder list read failed");
            if let Some(prev) = previous {
                snapshot.holders = prev.holders.clone();
            }
            snapshot.read_failures.push(ReadFailure {
                target: ReadTarget::Holders,
                error: e.to_string(),
            });
        }
    }

    match reader.circulating_supply() {
        Ok(supply) => snapshot.circulating_supply = supply,
        Err(e) => {
            warn!(error = %e, "circulating supply read failed");
            if let Some(prev) = previous {
                snapshot.circulating_supply = prev.circulating_supply;
            }
            snapshot.read_failures.push(ReadFailure {
                target: ReadTarget::CirculatingSupply,
                error: e.to_string(),
            });
        }
    }

    debug!(
        proposals = snapshot.proposals.len(),
        failures = snapshot.read_failures.len(),
        "snapshot fetched"
    );
    Ok(snapshot)
}

/// Cheap refresh between full fetches: re-list proposals, keep every other
/// field from `previous`, and read headcounts only for proposals that
/// `previous` has never seen. `read_failures` lists only this refresh's
/// failed reads.
pub fn refresh_proposals(
    reader: &dyn LedgerReader,
    previous: &Snapshot,
    now: Timestamp,
) -> Result<Snapshot, LedgerError> {
    let mut snapshot = Snapshot::new(reader.list_proposals()?, now);
    snapshot.votes = previous.votes.clone();
    snapshot.holders = previous.holders.clone();
    snapshot.circulating_supply = previous.circulating_supply;

    let known = previous.proposal_ids();
    for proposal in &snapshot.proposals {
        if known.contains(&proposal.id) {
            if let Some(count) = previous.headcounts.get(&proposal.id) {
                snapshot.headcounts.insert(proposal.id, *count);
            }
            continue;
        }
        match reader.headcount(proposal.id) {
            Ok(count) => {
                snapshot.headcounts.insert(proposal.id, count);
            }
            Err(e) => {
                warn!(proposal = %proposal.id, error = %e, "headcount read failed");
                snapshot.read_failures.push(ReadFailure {
                    target: ReadTarget::Headcount(proposal.id),
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::TokenAmount;

    fn account(n: u8) -> AccountId {
        AccountId::new([n; 20])
    }

    fn proposal(id: u64, proposer: AccountId) -> Proposal {
        Proposal {
            id: ProposalId::new(id),
            proposer,
            title: format!("p{id}"),
            description: String::new(),
            recipient: account(9),
            amount: TokenAmount::whole(1),
            created_at: Timestamp::new(100 + id),
            nominal_deadline: Timestamp::new(100 + id + 604_800),
            yes_vote_weight: 0,
            no_vote_weight: 0,
            executed: false,
            executed_at: None,
        }
    }

    fn vote(voter: u8, id: u64, at: u64) -> VoteRecord {
        VoteRecord {
            voter: account(voter),
            proposal: ProposalId::new(id),
            support: true,
            timestamp: Timestamp::new(at),
        }
    }

    #[test]
    fn new_filters_placeholders_and_sorts() {
        let snap = Snapshot::new(
            vec![proposal(3, account(1)), proposal(0, AccountId::ZERO), proposal(1, account(2))],
            Timestamp::new(0),
        );
        let ids: Vec<u64> = snap.proposals.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(snap.proposal(ProposalId::new(3)).is_some());
        assert!(snap.proposal(ProposalId::new(0)).is_none());
    }

    #[test]
    fn headcount_takes_larger_source() {
        let snap = Snapshot::new(vec![proposal(1, account(1))], Timestamp::new(0))
            .with_headcount(ProposalId::new(1), 1)
            .with_votes(vec![vote(1, 1, 10), vote(2, 1, 11), vote(2, 1, 12)]);
        assert_eq!(snap.headcount(ProposalId::new(1)), Some(2));
        assert_eq!(snap.headcount(ProposalId::new(2)), None);
    }

    #[test]
    fn nth_supporter_counts_distinct_voters() {
        let snap = Snapshot::new(vec![proposal(1, account(1))], Timestamp::new(0))
            .with_votes(vec![vote(1, 1, 10), vote(1, 1, 11), vote(2, 1, 30)]);
        assert_eq!(snap.nth_supporter_at(ProposalId::new(1), 1), Some(Timestamp::new(10)));
        assert_eq!(snap.nth_supporter_at(ProposalId::new(1), 2), Some(Timestamp::new(30)));
        assert_eq!(snap.nth_supporter_at(ProposalId::new(1), 3), None);
        assert_eq!(snap.nth_supporter_at(ProposalId::new(1), 0), None);
    }

    #[test]
    fn eligible_holders_use_floor() {
        let supply = TokenAmount::whole(1000);
        let snap = Snapshot::new(Vec::new(), Timestamp::new(0)).with_holders(
            vec![
                HolderBalance::new(account(1), TokenAmount::whole(500)),
                HolderBalance::new(account(2), TokenAmount::whole(10)),
                HolderBalance::new(account(3), TokenAmount::whole(5)),
            ],
            supply,
        );
        assert_eq!(snap.eligible_holder_count(100), 2);
        assert_eq!(snap.ownership_bps(&account(3)), 50);
        assert_eq!(snap.ownership_bps(&account(7)), 0);
        assert_eq!(snap.holders_by_balance()[0].account, account(1));
    }

    struct TwoProposals;

    impl LedgerReader for TwoProposals {
        fn list_proposals(&self) -> Result<Vec<Proposal>, LedgerError> {
            Ok(vec![proposal(1, account(1)), proposal(2, account(1))])
        }
        fn headcount(&self, proposal: ProposalId) -> Result<u32, LedgerError> {
            if proposal.get() == 2 {
                Ok(4)
            } else {
                Err(LedgerError::Timeout("headcount".into()))
            }
        }
        fn has_voted(&self, _: ProposalId, _: &AccountId) -> Result<bool, LedgerError> {
            Ok(false)
        }
        fn balance_of(&self, _: &AccountId) -> Result<TokenAmount, LedgerError> {
            Ok(TokenAmount::ZERO)
        }
        fn circulating_supply(&self) -> Result<TokenAmount, LedgerError> {
            Err(LedgerError::Unavailable("supply".into()))
        }
        fn list_holders(&self) -> Result<Vec<HolderBalance>, LedgerError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn fetch_carries_previous_values_over_failures() {
        let previous = Snapshot::new(vec![proposal(1, account(1))], Timestamp::new(0))
            .with_headcount(ProposalId::new(1), 3)
            .with_holders(Vec::new(), TokenAmount::whole(50));
        let snap = fetch_snapshot(&TwoProposals, Some(&previous), Timestamp::new(10)).unwrap();

        assert_eq!(snap.headcounts.get(&ProposalId::new(1)), Some(&3));
        assert_eq!(snap.headcounts.get(&ProposalId::new(2)), Some(&4));
        assert_eq!(snap.circulating_supply, TokenAmount::whole(50));
        assert_eq!(snap.read_failures.len(), 2);
        assert!(!snap.is_complete());
    }

    #[test]
    fn refresh_reads_only_new_headcounts() {
        let previous = Snapshot::new(vec![proposal(1, account(1))], Timestamp::new(0))
            .with_headcount(ProposalId::new(1), 3);
        let snap = refresh_proposals(&TwoProposals, &previous, Timestamp::new(10)).unwrap();
        assert_eq!(snap.proposals.len(), 2);
        assert_eq!(snap.headcounts.get(&ProposalId::new(1)), Some(&3));
        assert_eq!(snap.headcounts.get(&ProposalId::new(2)), Some(&4));
        assert!(snap.is_complete());
    }
    #[test]
    fn refresh_does_not_repeat_earlier_failures() {
        let full = fetch_snapshot(&TwoProposals, None, Timestamp::new(0)).unwrap();
        assert_eq!(full.read_failures.len(), 2);

        let refreshed = refresh_proposals(&TwoProposals, &full, Timestamp::new(5)).unwrap();
        assert!(refreshed.is_complete());
        assert_eq!(refreshed.headcounts.get(&ProposalId::new(2)), Some(&4));
    }
}
