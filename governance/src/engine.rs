//! The round engine and its per-pass view.
//!
//! Each pass is a pure function of the snapshot, the winner registry and
//! `now`: partition the proposals, look for early winners in open rounds,
//! record any that are found and partition again until nothing changes.
//! Statuses, eligibility and visibility are then read off the final layout.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tally_ledger::{LedgerReader, Snapshot};
use tally_types::{AccountId, GovernanceParams, Proposal, ProposalId, Timestamp};

use crate::cache::RoundCache;
use crate::early_win;
use crate::eligibility::{Eligibility, EligibilityGate};
use crate::registry::{LocalVoteLog, WinnerRegistry};
use crate::round::{self, Round};
use crate::status::{self, ProposalStatus};
use crate::submission::{self, ProposalPermission};
use crate::GovernanceError;

/// Long-lived engine state: parameters plus the process-local memory that
/// carries recognized wins from one pass to the next.
pub struct RoundEngine {
    params: GovernanceParams,
    registry: WinnerRegistry,
    local_votes: LocalVoteLog,
    cache: RoundCache,
}

impl RoundEngine {
    pub fn new(params: GovernanceParams) -> Result<Self, GovernanceError> {
        params.validate()?;
        let cache = RoundCache::new(params.round_cache_capacity);
        Ok(Self {
            params,
            registry: WinnerRegistry::new(),
            local_votes: LocalVoteLog::new(),
            cache,
        })
    }

    pub fn params(&self) -> &GovernanceParams {
        &self.params
    }

    pub fn registry(&self) -> &WinnerRegistry {
        &self.registry
    }

    /// Remember a vote this process just submitted. Advisory only.
    pub fn record_local_vote(&mut self, proposal: ProposalId, voter: AccountId) {
        self.local_votes.record(proposal, voter);
    }

    /// `(hits, misses)` of the round cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        (self.cache.hits(), self.cache.misses())
    }

    /// Rounds for `snapshot` as of `now`, ordered by start time.
    pub fn get_rounds(&mut self, snapshot: &Snapshot, now: Timestamp) -> Vec<Round> {
        self.reconcile(snapshot, now);

        let headcounts = snapshot.effective_headcounts();
        let eligible = snapshot.eligible_holder_count(self.params.min_ownership_bps);
        let fingerprint = self.fingerprint(snapshot, &headcounts, eligible);
        if let Some(rounds) = self.cache.get(fingerprint, now) {
            debug!(rounds = rounds.len(), "round layout served from cache");
            return rounds;
        }

        let policy = self.params.threshold_policy;
        let threshold = policy.threshold(eligible);
        let rounds = loop {
            let rounds = round::partition(
                &snapshot.proposals,
                self.registry.timestamps(),
                self.params.round_duration_secs,
                now,
            );
            // One new winner per pass: it can move every later round's bounds.
            let mut recognized = false;
            for candidate in &rounds {
                let found = early_win::first_crossing(candidate, snapshot, threshold).or_else(|| {
                    early_win::detect(candidate, &headcounts, eligible, policy)
                        .map(|id| (id, snapshot.nth_supporter_at(id, threshold).unwrap_or(now)))
                });
                let Some((winner, closed_at)) = found else {
                    continue;
                };
                if self.registry.record(winner, closed_at) {
                    info!(
                        round = candidate.id,
                        proposal = %winner,
                        threshold,
                        eligible_holders = eligible,
                        %closed_at,
                        "early winner recognized"
                    );
                    recognized = true;
                    break;
                }
            }
            if !recognized {
                break rounds;
            }
        };

        debug!(
            proposals = snapshot.proposals.len(),
            rounds = rounds.len(),
            eligible_holders = eligible,
            threshold,
            "round layout computed"
        );
        self.cache.insert(fingerprint, rounds.clone());
        rounds
    }

    /// Compute one pass and return a view for querying it.
    pub fn view<'a>(&'a mut self, snapshot: &'a Snapshot, now: Timestamp) -> RoundView<'a> {
        let rounds = self.get_rounds(snapshot, now);
        let headcounts = snapshot.effective_headcounts();
        let statuses = resolve_statuses(snapshot, &rounds, &headcounts, now);
        RoundView {
            params: &self.params,
            local_votes: &self.local_votes,
            snapshot,
            rounds,
            statuses,
            now,
        }
    }

    pub fn get_status(
        &mut self,
        proposal: ProposalId,
        snapshot: &Snapshot,
        now: Timestamp,
    ) -> Result<ProposalStatus, GovernanceError> {
        self.view(snapshot, now).get_status(proposal)
    }

    pub fn get_eligibility(
        &mut self,
        account: &AccountId,
        proposal: ProposalId,
        snapshot: &Snapshot,
        reader: &dyn LedgerReader,
        now: Timestamp,
    ) -> Result<Eligibility, GovernanceError> {
        self.view(snapshot, now).get_eligibility(account, proposal, reader)
    }

    pub fn should_hide(&mut self, proposal: ProposalId, snapshot: &Snapshot, now: Timestamp) -> bool {
        self.view(snapshot, now).should_hide(proposal)
    }

    /// Fold ledger facts that override local memory into the registry:
    /// vanished winners are purged, executed proposals are recorded.
    fn reconcile(&mut self, snapshot: &Snapshot, now: Timestamp) {
        let ids = snapshot.proposal_ids();
        let purged = self.registry.retain_known(&ids);
        if !purged.is_empty() {
            warn!(
                purged = ?purged,
                "recognized winners missing from ledger, dropping local state"
            );
            self.local_votes.retain_known(&ids);
            self.cache.clear();
        }
        self.cache.observe_ids(&ids);

        for proposal in snapshot.proposals.iter().filter(|p| p.executed) {
            let at = proposal.executed_at.unwrap_or(now);
            if self.registry.record(proposal.id, at) {
                debug!(proposal = %proposal.id, executed_at = %at, "executed proposal recorded as winner");
            }
        }
    }

    fn fingerprint(&self, snapshot: &Snapshot, headcounts: &BTreeMap<ProposalId, u32>, eligible: u32) -> u64 {
        let mut hasher = DefaultHasher::new();
        snapshot.proposals.hash(&mut hasher);
        headcounts.hash(&mut hasher);
        snapshot.votes.hash(&mut hasher);
        eligible.hash(&mut hasher);
        self.registry.timestamps().hash(&mut hasher);
        self.params.round_duration_secs.hash(&mut hasher);
        self.params.threshold_policy.as_str().hash(&mut hasher);
        hasher.finish()
    }
}

fn resolve_statuses(
    snapshot: &Snapshot,
    rounds: &[Round],
    headcounts: &BTreeMap<ProposalId, u32>,
    now: Timestamp,
) -> BTreeMap<ProposalId, ProposalStatus> {
    rounds
        .iter()
        .flat_map(|round| {
            round.proposals.iter().filter_map(move |id| {
                snapshot
                    .proposal(*id)
                    .map(|p| (*id, status::status_of(p, round, headcounts, now)))
            })
        })
        .collect()
}

/// One computed pass: rounds, statuses and the queries consumers run on them.
pub struct RoundView<'a> {
    params: &'a GovernanceParams,
    local_votes: &'a LocalVoteLog,
    snapshot: &'a Snapshot,
    rounds: Vec<Round>,
    statuses: BTreeMap<ProposalId, ProposalStatus>,
    now: Timestamp,
}

impl<'a> RoundView<'a> {
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn round_of(&self, proposal: ProposalId) -> Option<&Round> {
        self.rounds.iter().find(|r| r.contains(proposal))
    }

    /// The round still accepting votes, if any.
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.iter().find(|r| r.is_open())
    }

    pub fn get_status(&self, proposal: ProposalId) -> Result<ProposalStatus, GovernanceError> {
        self.statuses
            .get(&proposal)
            .copied()
            .ok_or(GovernanceError::UnknownProposal(proposal))
    }

    pub fn statuses(&self) -> &BTreeMap<ProposalId, ProposalStatus> {
        &self.statuses
    }

    /// Whether the proposal should leave the active listing: it was executed,
    /// or another proposal won its round early. Members of a naturally closed
    /// round stay listed with their final status.
    pub fn should_hide(&self, proposal: ProposalId) -> bool {
        if self.snapshot.proposal(proposal).is_some_and(|p| p.executed) {
            return true;
        }
        self.round_of(proposal)
            .and_then(|round| round.early_winner)
            .is_some_and(|winner| winner != proposal)
    }

    pub fn get_eligibility(
        &self,
        account: &AccountId,
        proposal: ProposalId,
        reader: &dyn LedgerReader,
    ) -> Result<Eligibility, GovernanceError> {
        let gate = EligibilityGate {
            rounds: &self.rounds,
            snapshot: self.snapshot,
            reader,
            local_votes: self.local_votes,
            min_ownership_bps: self.params.min_ownership_bps,
        };
        Ok(gate.can_vote(account, proposal)?)
    }

    /// Token buys and refunds are frozen while a round is open.
    pub fn can_trade_tokens(&self) -> bool {
        self.current_round().is_none()
    }

    /// Proposals that won their round: unexecuted first, then by most recent
    /// nominal deadline.
    pub fn winning_proposals(&self) -> Vec<&'a Proposal> {
        let mut winners: Vec<&Proposal> = self
            .snapshot
            .proposals
            .iter()
            .filter(|p| self.statuses.get(&p.id).is_some_and(ProposalStatus::is_winning))
            .collect();
        winners.sort_by(|a, b| {
            a.executed
                .cmp(&b.executed)
                .then(b.nominal_deadline.cmp(&a.nominal_deadline))
                .then(a.id.cmp(&b.id))
        });
        winners
    }

    /// Won but not yet paid out, in id order.
    pub fn execution_candidates(&self) -> Vec<ProposalId> {
        self.statuses
            .iter()
            .filter(|(_, s)| matches!(s, ProposalStatus::EarlyWin | ProposalStatus::Succeeded))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn can_propose(&self, account: &AccountId) -> ProposalPermission {
        submission::can_propose(
            account,
            self.snapshot,
            &self.rounds,
            &self.statuses,
            self.params,
            self.now,
        )
    }

    /// Serializable digest of the pass.
    pub fn summary(&self) -> RoundSummary {
        let eligible_holders = self.snapshot.eligible_holder_count(self.params.min_ownership_bps);
        RoundSummary {
            computed_at: self.now,
            snapshot_taken_at: self.snapshot.taken_at,
            proposals: self.snapshot.proposals.len(),
            eligible_holders,
            threshold: self.params.threshold_policy.threshold(eligible_holders),
            current_round: self.current_round().map(|r| r.id),
            can_trade_tokens: self.can_trade_tokens(),
            rounds: self.rounds.clone(),
            statuses: self.statuses.clone(),
            execution_candidates: self.execution_candidates(),
            read_failures: self.snapshot.read_failures.len(),
        }
    }
}

/// What a watcher publishes after each poll.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub computed_at: Timestamp,
    pub snapshot_taken_at: Timestamp,
    pub proposals: usize,
    pub eligible_holders: u32,
    pub threshold: u32,
    pub current_round: Option<u32>,
    pub can_trade_tokens: bool,
    pub rounds: Vec<Round>,
    pub statuses: BTreeMap<ProposalId, ProposalStatus>,
    pub execution_candidates: Vec<ProposalId>,
    pub read_failures: usize,
}

impl RoundSummary {
    pub fn open_rounds(&self) -> usize {
        self.rounds.iter().filter(|r| r.is_open()).count()
    }

    pub fn early_wins(&self) -> usize {
        self.rounds.iter().filter(|r| r.early_winner.is_some()).count()
    }
}
