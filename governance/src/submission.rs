//! Who may create a proposal, and when.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use tally_ledger::Snapshot;
use tally_types::{AccountId, GovernanceParams, ProposalId, Timestamp};

use crate::round::Round;
use crate::status::ProposalStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionReason {
    Allowed,
    InsufficientSupply,
    NotTopHolder,
    RateLimited,
}

impl PermissionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::InsufficientSupply => "insufficient_supply",
            Self::NotTopHolder => "not_top_holder",
            Self::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for PermissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a submission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPermission {
    pub allowed: bool,
    pub reason: PermissionReason,
    /// Proposals the account created since the last reset point.
    pub recent_proposals: u32,
    /// Earliest instant the window frees a slot, when it is time-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Timestamp>,
}

impl ProposalPermission {
    fn new(reason: PermissionReason, recent_proposals: u32) -> Self {
        Self {
            allowed: reason == PermissionReason::Allowed,
            reason,
            recent_proposals,
            retry_after: None,
        }
    }
}

/// Decide whether `account` may submit a proposal at `now`.
///
/// The account must hold tokens while circulating supply is at least
/// `min_circulating_supply_tokens`, rank among the `top_proposers` largest holders,
/// and have created fewer than `max_proposals_per_window` proposals since its
/// reset point. The reset point is the deadline of its latest winning
/// proposal (or `now - proposal_window_secs` without one), moved forward to
/// the end of the latest finished round when that is later.
pub fn can_propose(
    account: &AccountId,
    snapshot: &Snapshot,
    rounds: &[Round],
    statuses: &BTreeMap<ProposalId, ProposalStatus>,
    params: &GovernanceParams,
    now: Timestamp,
) -> ProposalPermission {
    let balance = snapshot
        .holders
        .iter()
        .find(|h| &h.account == account)
        .map(|h| h.balance)
        .unwrap_or_default();
    if snapshot.circulating_supply < params.min_circulating_supply() || balance.is_zero() {
        return ProposalPermission::new(PermissionReason::InsufficientSupply, 0);
    }

    let is_top = snapshot
        .holders_by_balance()
        .into_iter()
        .take(params.top_proposers as usize)
        .any(|h| &h.account == account);
    if !is_top {
        return ProposalPermission::new(PermissionReason::NotTopHolder, 0);
    }

    let own: Vec<_> = snapshot
        .proposals
        .iter()
        .filter(|p| &p.proposer == account)
        .collect();
    let latest_win = own
        .iter()
        .filter(|p| statuses.get(&p.id).is_some_and(ProposalStatus::is_winning))
        .map(|p| p.nominal_deadline)
        .max();
    let mut reset = latest_win.unwrap_or_else(|| now.minus_secs(params.proposal_window_secs));
    if let Some(end) = rounds
        .iter()
        .filter(|r| r.is_finished)
        .filter_map(|r| r.actual_end_time)
        .max()
    {
        reset = reset.max(end);
    }

    let mut recent: Vec<Timestamp> = own
        .iter()
        .map(|p| p.created_at)
        .filter(|&created| created > reset)
        .collect();
    recent.sort();
    let count = recent.len() as u32;

    if count < params.max_proposals_per_window {
        return ProposalPermission::new(PermissionReason::Allowed, count);
    }
    let mut denied = ProposalPermission::new(PermissionReason::RateLimited, count);
    if latest_win.is_none() {
        denied.retry_after = recent
            .first()
            .map(|oldest| oldest.plus_secs(params.proposal_window_secs));
    }
    denied
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{HolderBalance, Proposal, TokenAmount};

    const WEEK: u64 = 604_800;
    const T0: u64 = 1_700_000_000;

    fn account(n: u8) -> AccountId {
        AccountId::new([n; 20])
    }

    fn proposal(id: u64, proposer: u8, created: u64) -> Proposal {
        Proposal {
            id: ProposalId::new(id),
            proposer: account(proposer),
            title: String::new(),
            description: String::new(),
            recipient: account(9),
            amount: TokenAmount::whole(1),
            created_at: Timestamp::new(created),
            nominal_deadline: Timestamp::new(created + WEEK),
            yes_vote_weight: 0,
            no_vote_weight: 0,
            executed: false,
            executed_at: None,
        }
    }

    fn snapshot(proposals: Vec<Proposal>) -> Snapshot {
        Snapshot::new(proposals, Timestamp::new(T0)).with_holders(
            vec![
                HolderBalance::new(account(1), TokenAmount::whole(600)),
                HolderBalance::new(account(2), TokenAmount::whole(300)),
                HolderBalance::new(account(3), TokenAmount::whole(100)),
            ],
            TokenAmount::whole(1000),
        )
    }

    fn check(snap: &Snapshot, statuses: &BTreeMap<ProposalId, ProposalStatus>, who: u8, now: u64) -> ProposalPermission {
        can_propose(
            &account(who),
            snap,
            &[],
            statuses,
            &GovernanceParams::default(),
            Timestamp::new(now),
        )
    }

    #[test]
    fn low_supply_blocks_everyone() {
        let snap = snapshot(Vec::new()).with_holders(
            vec![HolderBalance::new(account(1), TokenAmount::whole(10))],
            TokenAmount::whole(10),
        );
        assert_eq!(check(&snap, &BTreeMap::new(), 1, T0).reason, PermissionReason::InsufficientSupply);
    }

    #[test]
    fn only_top_two_may_propose() {
        let snap = snapshot(Vec::new());
        assert!(check(&snap, &BTreeMap::new(), 1, T0).allowed);
        assert!(check(&snap, &BTreeMap::new(), 2, T0).allowed);
        assert_eq!(check(&snap, &BTreeMap::new(), 3, T0).reason, PermissionReason::NotTopHolder);
        assert_eq!(check(&snap, &BTreeMap::new(), 7, T0).reason, PermissionReason::InsufficientSupply);
    }

    #[test]
    fn fourth_proposal_in_window_is_rate_limited() {
        let snap = snapshot(vec![
            proposal(1, 1, T0 - 3000),
            proposal(2, 1, T0 - 2000),
            proposal(3, 1, T0 - 1000),
        ]);
        let result = check(&snap, &BTreeMap::new(), 1, T0);
        assert_eq!(result.reason, PermissionReason::RateLimited);
        assert_eq!(result.recent_proposals, 3);
        assert_eq!(result.retry_after, Some(Timestamp::new(T0 - 3000 + WEEK)));

        let later = check(&snap, &BTreeMap::new(), 1, T0 - 3000 + WEEK + 1);
        assert!(later.allowed);
        assert_eq!(later.recent_proposals, 2);
    }

    #[test]
    fn winning_proposal_resets_the_count() {
        let snap = snapshot(vec![
            proposal(1, 1, T0),
            proposal(2, 1, T0 + 10),
            proposal(3, 1, T0 + 20),
        ]);
        let statuses = BTreeMap::from([(ProposalId::new(1), ProposalStatus::Executed)]);
        let result = check(&snap, &statuses, 1, T0 + WEEK + 100);
        assert!(result.allowed);
        assert_eq!(result.recent_proposals, 0);
    }

    #[test]
    fn finished_round_end_moves_reset_forward() {
        let snap = snapshot(vec![
            proposal(1, 1, T0),
            proposal(2, 1, T0 + 10),
            proposal(3, 1, T0 + 20),
        ]);
        let round = Round {
            id: 1,
            start_time: Timestamp::new(T0),
            nominal_end_time: Timestamp::new(T0 + WEEK),
            proposals: vec![ProposalId::new(1), ProposalId::new(2), ProposalId::new(3)],
            is_finished: true,
            early_winner: Some(ProposalId::new(2)),
            actual_end_time: Some(Timestamp::new(T0 + 30)),
        };
        let result = can_propose(
            &account(1),
            &snap,
            &[round],
            &BTreeMap::new(),
            &GovernanceParams::default(),
            Timestamp::new(T0 + 40),
        );
        assert!(result.allowed);
    }
}
