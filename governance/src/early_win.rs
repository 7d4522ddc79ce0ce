//! Early-win detection.
//!
//! A proposal wins its round early once its supporter headcount reaches the
//! configured threshold of eligible holders. Rounds that already have a
//! winner are never re-evaluated: if the eligible-holder count later moves,
//! the win stands.
//!
//! Two sources can establish a win. Vote events fix the instant the
//! threshold-th supporter voted, and count for any round, open or already
//! past its nominal end ([`first_crossing`]). Without them, only an open
//! round can be won, on its current headcounts ([`detect`]).

use std::collections::BTreeMap;

use tally_ledger::Snapshot;
use tally_types::{ProposalId, ThresholdPolicy, Timestamp};

use crate::round::Round;

/// The first proposal in ledger-id order whose headcount meets the threshold,
/// or `None` if the round is closed, already has a winner, or nobody qualifies.
///
/// Proposals without a known headcount are skipped rather than blocking the
/// others. A threshold of zero (no eligible holders) never produces a winner.
pub fn detect(
    round: &Round,
    headcounts: &BTreeMap<ProposalId, u32>,
    eligible_holders: u32,
    policy: ThresholdPolicy,
) -> Option<ProposalId> {
    if round.is_finished || round.early_winner.is_some() {
        return None;
    }
    let threshold = policy.threshold(eligible_holders);
    if threshold == 0 {
        return None;
    }
    let mut members = round.proposals.clone();
    members.sort();
    members
        .into_iter()
        .find(|id| headcounts.get(id).is_some_and(|&count| count >= threshold))
}

/// The member whose `threshold`-th distinct supporter voted first, with that
/// vote's timestamp. Only crossings inside `[created_at, nominal_end_time]`
/// count; ties go to the lower id. `None` if the round already has a winner.
pub fn first_crossing(
    round: &Round,
    snapshot: &Snapshot,
    threshold: u32,
) -> Option<(ProposalId, Timestamp)> {
    if round.early_winner.is_some() || threshold == 0 {
        return None;
    }
    round
        .proposals
        .iter()
        .filter_map(|&id| {
            let created_at = snapshot.proposal(id)?.created_at;
            let at = snapshot.nth_supporter_at(id, threshold)?;
            (created_at <= at && at <= round.nominal_end_time).then_some((at, id))
        })
        .min()
        .map(|(at, id)| (id, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{AccountId, Proposal, TokenAmount, VoteRecord};

    fn open_round(ids: &[u64]) -> Round {
        Round {
            id: 1,
            start_time: Timestamp::new(0),
            nominal_end_time: Timestamp::new(604_800),
            proposals: ids.iter().map(|&i| ProposalId::new(i)).collect(),
            is_finished: false,
            early_winner: None,
            actual_end_time: None,
        }
    }

    fn counts(pairs: &[(u64, u32)]) -> BTreeMap<ProposalId, u32> {
        pairs.iter().map(|&(id, c)| (ProposalId::new(id), c)).collect()
    }

    #[test]
    fn five_holders_need_three_supporters() {
        let round = open_round(&[1]);
        assert_eq!(detect(&round, &counts(&[(1, 2)]), 5, ThresholdPolicy::HalfCeil), None);
        assert_eq!(
            detect(&round, &counts(&[(1, 3)]), 5, ThresholdPolicy::HalfCeil),
            Some(ProposalId::new(1))
        );
    }

    #[test]
    fn boundary_equality_wins() {
        let round = open_round(&[1]);
        assert_eq!(
            detect(&round, &counts(&[(1, 2)]), 4, ThresholdPolicy::HalfCeil),
            Some(ProposalId::new(1))
        );
    }

    #[test]
    fn no_eligible_holders_means_no_winner() {
        let round = open_round(&[1]);
        assert_eq!(detect(&round, &counts(&[(1, 10)]), 0, ThresholdPolicy::HalfCeil), None);
    }

    #[test]
    fn simultaneous_crossings_pick_lowest_id() {
        let mut round = open_round(&[7, 3, 5]);
        round.proposals = vec![ProposalId::new(7), ProposalId::new(5), ProposalId::new(3)];
        let winner = detect(
            &round,
            &counts(&[(7, 3), (5, 3), (3, 1)]),
            4,
            ThresholdPolicy::HalfCeil,
        );
        assert_eq!(winner, Some(ProposalId::new(5)));
    }

    #[test]
    fn unknown_headcount_is_skipped() {
        let round = open_round(&[1, 2]);
        assert_eq!(
            detect(&round, &counts(&[(2, 2)]), 3, ThresholdPolicy::HalfCeil),
            Some(ProposalId::new(2))
        );
    }

    #[test]
    fn finished_round_is_not_evaluated() {
        let mut round = open_round(&[1]);
        round.is_finished = true;
        assert_eq!(detect(&round, &counts(&[(1, 9)]), 2, ThresholdPolicy::HalfCeil), None);
    }

    #[test]
    fn min_two_policy_rejects_single_supporter() {
        let round = open_round(&[1]);
        assert_eq!(detect(&round, &counts(&[(1, 1)]), 1, ThresholdPolicy::MajorityMinTwo), None);
        assert_eq!(
            detect(&round, &counts(&[(1, 2)]), 1, ThresholdPolicy::MajorityMinTwo),
            Some(ProposalId::new(1))
        );
    }

    fn proposal(id: u64, created: u64) -> Proposal {
        Proposal {
            id: ProposalId::new(id),
            proposer: AccountId::new([1; 20]),
            title: String::new(),
            description: String::new(),
            recipient: AccountId::new([9; 20]),
            amount: TokenAmount::whole(1),
            created_at: Timestamp::new(created),
            nominal_deadline: Timestamp::new(created + 604_800),
            yes_vote_weight: 0,
            no_vote_weight: 0,
            executed: false,
            executed_at: None,
        }
    }

    fn vote(voter: u8, proposal: u64, at: u64) -> VoteRecord {
        VoteRecord {
            voter: AccountId::new([voter; 20]),
            proposal: ProposalId::new(proposal),
            support: true,
            timestamp: Timestamp::new(at),
        }
    }

    #[test]
    fn crossing_counts_after_nominal_end() {
        let mut round = open_round(&[1, 2]);
        round.is_finished = true;
        round.actual_end_time = Some(round.nominal_end_time);
        let snap = Snapshot::new(vec![proposal(1, 0), proposal(2, 100)], Timestamp::new(700_000))
            .with_votes(vec![vote(3, 2, 500), vote(4, 2, 900), vote(3, 1, 200)]);
        assert_eq!(
            first_crossing(&round, &snap, 2),
            Some((ProposalId::new(2), Timestamp::new(900)))
        );
    }

    #[test]
    fn earliest_crossing_wins_over_lower_id() {
        let round = open_round(&[1, 2]);
        let snap = Snapshot::new(vec![proposal(1, 0), proposal(2, 100)], Timestamp::new(5_000))
            .with_votes(vec![
                vote(3, 1, 400),
                vote(4, 1, 3_000),
                vote(3, 2, 500),
                vote(4, 2, 600),
            ]);
        assert_eq!(
            first_crossing(&round, &snap, 2),
            Some((ProposalId::new(2), Timestamp::new(600)))
        );
    }

    #[test]
    fn crossing_after_the_window_does_not_count() {
        let round = open_round(&[1]);
        let snap = Snapshot::new(vec![proposal(1, 0)], Timestamp::new(700_000))
            .with_votes(vec![vote(3, 1, 100), vote(4, 1, 604_801)]);
        assert_eq!(first_crossing(&round, &snap, 2), None);
        assert_eq!(first_crossing(&round, &snap, 0), None);
    }
}
