//! Human and JSON rendering of command results.

use serde::Serialize;
use serde_json::json;

use tally_governance::{Eligibility, ProposalPermission, ProposalStatus, RoundSummary, RoundView};
use tally_types::{AccountId, ProposalId, Timestamp};
use tally_utils::{format_bps, format_relative};

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn rounds(view: &RoundView<'_>, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(view.rounds());
    }
    let now = view.now();
    if view.rounds().is_empty() {
        println!("no rounds");
    }
    for round in view.rounds() {
        let state = match (round.is_finished, round.early_winner) {
            (false, _) => format!("open, ends {}", format_relative(round.nominal_end_time, now)),
            (true, Some(winner)) => format!(
                "won by {winner} {}",
                round
                    .actual_end_time
                    .map(|end| format_relative(end, now))
                    .unwrap_or_default()
            ),
            (true, None) => format!("closed {}", format_relative(round.nominal_end_time, now)),
        };
        println!("round {} [{}]", round.id, state);
        for id in &round.proposals {
            let title = view.snapshot().proposal(*id).map(|p| p.title.as_str()).unwrap_or("");
            let status = view
                .statuses()
                .get(id)
                .map(ProposalStatus::as_str)
                .unwrap_or("-");
            let headcount = view.snapshot().headcount(*id).unwrap_or(0);
            println!("  {id:<6} {status:<10} {headcount:>4} votes  {title}");
        }
    }
    println!(
        "token trading {}",
        if view.can_trade_tokens() { "open" } else { "frozen" }
    );
    Ok(())
}

pub fn status(
    view: &RoundView<'_>,
    proposal: ProposalId,
    status: ProposalStatus,
    json: bool,
) -> anyhow::Result<()> {
    let round = view.round_of(proposal).map(|r| r.id);
    let hidden = view.should_hide(proposal);
    if json {
        return print_json(&json!({
            "proposal": proposal.get(),
            "status": status,
            "round": round,
            "hidden": hidden,
        }));
    }
    match round {
        Some(round) => println!("{proposal} {status} (round {round})"),
        None => println!("{proposal} {status}"),
    }
    if hidden {
        println!("hidden from the active listing");
    }
    Ok(())
}

pub fn eligibility(
    account: &AccountId,
    proposal: ProposalId,
    eligibility: &Eligibility,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        return print_json(eligibility);
    }
    let verdict = if eligibility.allowed { "may vote" } else { "may not vote" };
    println!(
        "{account} {verdict} on {proposal}: {} (owns {})",
        eligibility.reason,
        format_bps(eligibility.ownership_bps)
    );
    Ok(())
}

pub fn ids(ids: &[ProposalId], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(ids);
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

pub fn winners(view: &RoundView<'_>, json: bool) -> anyhow::Result<()> {
    let winners = view.winning_proposals();
    if json {
        return print_json(&winners);
    }
    for p in winners {
        let state = if p.executed { "executed" } else { "awaiting execution" };
        println!("{:<6} {:<20} {} to {}  {}", p.id, state, p.amount, p.recipient, p.title);
    }
    Ok(())
}

pub fn permission(
    account: &AccountId,
    permission: &ProposalPermission,
    now: Timestamp,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        return print_json(permission);
    }
    let verdict = if permission.allowed { "may propose" } else { "may not propose" };
    println!(
        "{account} {verdict}: {} ({} recent)",
        permission.reason, permission.recent_proposals
    );
    if let Some(retry) = permission.retry_after {
        println!("a slot frees up {}", format_relative(retry, now));
    }
    Ok(())
}

/// One line per published summary while watching.
pub fn summary(summary: &RoundSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }
    let current = summary
        .current_round
        .map(|id| format!("round {id} open"))
        .unwrap_or_else(|| "no open round".to_string());
    println!(
        "[{}] {} proposals, {} rounds, {current}, threshold {}/{} holders, {} awaiting execution",
        summary.computed_at,
        summary.proposals,
        summary.rounds.len(),
        summary.threshold,
        summary.eligible_holders,
        summary.execution_candidates.len()
    );
    Ok(())
}
