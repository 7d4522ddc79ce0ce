//! End-to-end round scenarios driven through the nullable ledger.

use tally_governance::{EligibilityReason, PermissionReason, ProposalStatus, RoundEngine};
use tally_ledger::{fetch_snapshot, LedgerReader, Snapshot};
use tally_nullables::{FailureMode, NullLedger};
use tally_types::{AccountId, GovernanceParams, ProposalId, Timestamp, TokenAmount};

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const T0: u64 = 1_700_000_000;

fn account(n: u8) -> AccountId {
    AccountId::new([n; 20])
}

fn at(offset: u64) -> Timestamp {
    Timestamp::new(T0 + offset)
}

/// `holders` accounts with equal balances, numbered from 1.
fn ledger_with_holders(holders: u8) -> NullLedger {
    let ledger = NullLedger::new();
    for i in 1..=holders {
        ledger.set_balance(account(i), TokenAmount::whole(1000));
    }
    ledger
}

fn snap(ledger: &NullLedger, now: Timestamp) -> Snapshot {
    fetch_snapshot(ledger, None, now).unwrap()
}

fn engine() -> RoundEngine {
    RoundEngine::new(GovernanceParams::default()).unwrap()
}

#[test]
fn natural_close_picks_highest_headcount() {
    let ledger = ledger_with_holders(10);
    let p1 = ledger.propose(1, account(1), at(0));
    let p2 = ledger.propose(2, account(2), at(HOUR));
    ledger.cast_vote(account(3), p1, at(DAY));
    ledger.cast_vote(account(4), p1, at(DAY));
    ledger.cast_vote(account(5), p2, at(DAY));

    let mut engine = engine();
    let now = at(WEEK + 1);
    let snapshot = snap(&ledger, now);
    let view = engine.view(&snapshot, now);

    let round = &view.rounds()[0];
    assert!(round.is_finished);
    assert_eq!(round.early_winner, None);
    assert_eq!(round.actual_end_time, Some(at(WEEK)));
    assert_eq!(view.get_status(p1).unwrap(), ProposalStatus::Succeeded);
    assert_eq!(view.get_status(p2).unwrap(), ProposalStatus::Defeated);
    assert_eq!(view.execution_candidates(), vec![p1]);
    assert!(view.can_trade_tokens());
    assert!(!view.should_hide(p1));
    assert!(!view.should_hide(p2));
}

#[test]
fn boundary_equality_triggers_early_win() {
    let ledger = ledger_with_holders(4);
    let p1 = ledger.propose(1, account(1), at(0));
    ledger.cast_vote(account(1), p1, at(HOUR));
    ledger.cast_vote(account(2), p1, at(2 * HOUR));

    let mut engine = engine();
    let now = at(DAY);
    let snapshot = snap(&ledger, now);
    let view = engine.view(&snapshot, now);

    assert_eq!(view.get_status(p1).unwrap(), ProposalStatus::EarlyWin);
    let round = view.round_of(p1).unwrap();
    assert_eq!(round.early_winner, Some(p1));
    assert_eq!(round.actual_end_time, Some(at(2 * HOUR)));
    assert!(view.current_round().is_none());
}

#[test]
fn execution_without_prior_win_closes_round_retroactively() {
    let ledger = ledger_with_holders(6);
    let p1 = ledger.propose(1, account(1), at(0));
    let p2 = ledger.propose(2, account(2), at(DAY));
    ledger.execute(p1, at(2 * DAY));

    let mut engine = engine();
    let now = at(2 * DAY + HOUR);
    let snapshot = snap(&ledger, now);
    let view = engine.view(&snapshot, now);

    let round = view.round_of(p1).unwrap();
    assert_eq!(round.early_winner, Some(p1));
    assert_eq!(round.actual_end_time, Some(at(2 * DAY)));
    assert_eq!(view.get_status(p1).unwrap(), ProposalStatus::Executed);
    assert_eq!(view.get_status(p2).unwrap(), ProposalStatus::Defeated);
    assert!(view.should_hide(p1));
    assert!(view.should_hide(p2));
    assert!(view.execution_candidates().is_empty());
}

#[test]
fn second_vote_in_open_round_is_rejected() {
    let ledger = ledger_with_holders(10);
    let p1 = ledger.propose(1, account(1), at(0));
    let p2 = ledger.propose(2, account(2), at(HOUR));
    ledger.cast_vote(account(3), p1, at(2 * HOUR));

    let mut engine = engine();
    let now = at(3 * HOUR);
    let snapshot = snap(&ledger, now);
    let result = engine
        .get_eligibility(&account(3), p2, &snapshot, &ledger, now)
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.reason, EligibilityReason::AlreadyVotedInRound);

    let fresh = engine
        .get_eligibility(&account(4), p2, &snapshot, &ledger, now)
        .unwrap();
    assert!(fresh.allowed);
    assert_eq!(fresh.reason, EligibilityReason::Eligible);
}

#[test]
fn later_proposal_after_early_win_opens_new_round() {
    let ledger = ledger_with_holders(4);
    let p1 = ledger.propose(1, account(1), at(0));
    ledger.cast_vote(account(1), p1, at(HOUR));
    ledger.cast_vote(account(2), p1, at(2 * HOUR));
    let p2 = ledger.propose(2, account(2), at(DAY));

    let mut engine = engine();
    let now = at(DAY + HOUR);
    let snapshot = snap(&ledger, now);
    let view = engine.view(&snapshot, now);

    assert_eq!(view.rounds().len(), 2);
    assert_eq!(view.round_of(p2).unwrap().id, 2);
    assert_eq!(view.get_status(p2).unwrap(), ProposalStatus::Active);
    assert_eq!(view.current_round().map(|r| r.id), Some(2));
    assert!(!view.can_trade_tokens());
}

#[test]
fn late_client_rebuilds_early_win_from_vote_history() {
    let ledger = ledger_with_holders(4);
    let p1 = ledger.propose(1, account(1), at(0));
    let p2 = ledger.propose(2, account(2), at(DAY));
    ledger.cast_vote(account(1), p1, at(2 * DAY));
    ledger.cast_vote(account(2), p1, at(2 * DAY));
    let p3 = ledger.propose(3, account(3), at(3 * DAY));

    let mut live = engine();
    let early = at(3 * DAY + 60);
    live.get_rounds(&snap(&ledger, early), early);

    let late = at(8 * DAY);
    let snapshot = snap(&ledger, late);
    let from_live = live.get_rounds(&snapshot, late);
    let mut fresh = engine();
    let view = fresh.view(&snapshot, late);

    assert_eq!(view.rounds(), from_live.as_slice());
    assert_eq!(view.rounds()[0].proposals, vec![p1, p2]);
    assert_eq!(view.rounds()[0].early_winner, Some(p1));
    assert_eq!(view.rounds()[0].actual_end_time, Some(at(2 * DAY)));
    assert_eq!(view.round_of(p3).unwrap().id, 2);
    assert_eq!(view.get_status(p1).unwrap(), ProposalStatus::EarlyWin);
    assert!(view.should_hide(p2));
}

#[test]
fn headcount_failure_does_not_block_other_proposals() {
    let ledger = ledger_with_holders(4);
    let p1 = ledger.propose(1, account(1), at(0));
    let p2 = ledger.propose(2, account(2), at(HOUR));
    ledger.set_headcount(p2, 2);
    ledger.set_failures(FailureMode {
        headcounts: [p1].into_iter().collect(),
        votes: true,
        ..FailureMode::default()
    });

    let mut engine = engine();
    let now = at(DAY);
    let snapshot = snap(&ledger, now);
    assert!(!snapshot.is_complete());

    let view = engine.view(&snapshot, now);
    assert_eq!(view.get_status(p2).unwrap(), ProposalStatus::EarlyWin);
    assert_eq!(view.get_status(p1).unwrap(), ProposalStatus::Defeated);
}

#[test]
fn ledger_reset_purges_recognized_winner() {
    let ledger = ledger_with_holders(4);
    let p1 = ledger.propose(1, account(1), at(0));
    ledger.set_headcount(p1, 2);

    let mut engine = engine();
    let now = at(DAY);
    engine.get_rounds(&snap(&ledger, now), now);
    assert!(engine.registry().contains(p1));

    ledger.reset_proposals();
    let fresh = ledger.propose(7, account(1), at(DAY));
    let later = at(DAY + HOUR);
    let snapshot = snap(&ledger, later);
    let view = engine.view(&snapshot, later);

    assert!(view.rounds().iter().all(|r| r.early_winner.is_none()));
    assert_eq!(view.get_status(fresh).unwrap(), ProposalStatus::Active);
    assert!(view.get_status(p1).is_err());
}

#[test]
fn local_vote_pre_empts_but_never_permits() {
    let ledger = ledger_with_holders(10);
    let p1 = ledger.propose(1, account(1), at(0));
    let mut engine = engine();
    let now = at(HOUR);
    let snapshot = snap(&ledger, now);

    engine.record_local_vote(p1, account(5));
    let pre_empted = engine
        .get_eligibility(&account(5), p1, &snapshot, &ledger, now)
        .unwrap();
    assert_eq!(pre_empted.reason, EligibilityReason::AlreadyVoted);

    ledger.cast_vote(account(6), p1, now);
    let on_ledger = engine
        .get_eligibility(&account(6), p1, &snapshot, &ledger, now)
        .unwrap();
    assert_eq!(on_ledger.reason, EligibilityReason::AlreadyVoted);
}

#[test]
fn read_failure_in_gate_is_retryable() {
    let ledger = ledger_with_holders(4);
    let p1 = ledger.propose(1, account(1), at(0));
    let mut engine = engine();
    let now = at(HOUR);
    let snapshot = snap(&ledger, now);

    ledger.set_failures(FailureMode {
        has_voted: true,
        ..FailureMode::default()
    });
    let err = engine
        .get_eligibility(&account(2), p1, &snapshot, &ledger, now)
        .unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn proposal_submission_follows_holder_rank_and_limit() {
    let ledger = NullLedger::new();
    ledger.set_balance(account(1), TokenAmount::whole(600));
    ledger.set_balance(account(2), TokenAmount::whole(300));
    ledger.set_balance(account(3), TokenAmount::whole(100));
    for i in 0..3 {
        ledger.propose(i + 1, account(1), at(i * HOUR));
    }

    let mut engine = engine();
    let now = at(4 * HOUR);
    let snapshot = snap(&ledger, now);
    let view = engine.view(&snapshot, now);

    let limited = view.can_propose(&account(1));
    assert_eq!(limited.reason, PermissionReason::RateLimited);
    assert_eq!(limited.retry_after, Some(at(WEEK)));
    assert!(view.can_propose(&account(2)).allowed);
    assert_eq!(view.can_propose(&account(3)).reason, PermissionReason::NotTopHolder);
    assert_eq!(ledger.ownership_bps(&account(3)).unwrap(), 1000);
}

#[test]
fn status_of_proposal_from_the_future_is_pending() {
    let ledger = ledger_with_holders(4);
    let p1 = ledger.propose(1, account(1), at(HOUR));
    let mut engine = engine();
    let skewed = at(HOUR - 30);
    let snapshot = snap(&ledger, skewed);
    assert_eq!(engine.get_status(p1, &snapshot, skewed).unwrap(), ProposalStatus::Pending);
}

#[test]
fn placeholder_slots_are_ignored() {
    let ledger = ledger_with_holders(4);
    ledger.propose(1, AccountId::ZERO, at(0));
    let p2 = ledger.propose(2, account(1), at(HOUR));
    let mut engine = engine();
    let now = at(2 * HOUR);
    let snapshot = snap(&ledger, now);
    let view = engine.view(&snapshot, now);
    assert_eq!(view.rounds().len(), 1);
    assert_eq!(view.rounds()[0].proposals, vec![p2]);
    assert!(view.get_status(ProposalId::new(1)).is_err());
}
