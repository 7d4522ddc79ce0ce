//! Governance parameters: round length, voting floor, early-win threshold
//! policy and proposal-submission limits.

use crate::amount::TokenAmount;
use crate::error::TallyError;
use serde::{Deserialize, Serialize};

/// How many supporters a proposal needs, given the number of eligible holders,
/// to close its round early.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdPolicy {
    /// `ceil(n / 2)`.
    #[default]
    HalfCeil,
    /// `max(2, floor(n / 2) + 1)`.
    MajorityMinTwo,
}

impl ThresholdPolicy {
    /// Supporters required for an early win. Zero means "no early win possible".
    pub fn threshold(&self, eligible_holders: u32) -> u32 {
        if eligible_holders == 0 {
            return 0;
        }
        match self {
            Self::HalfCeil => eligible_holders.div_ceil(2),
            Self::MajorityMinTwo => (eligible_holders / 2 + 1).max(2),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HalfCeil => "half-ceil",
            Self::MajorityMinTwo => "majority-min-two",
        }
    }
}

/// Every knob the engine consults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceParams {
    // ── Rounds ───────────────────────────────────────────────────────────
    /// Nominal round length in seconds. Default: 7 days.
    pub round_duration_secs: u64,

    /// Early-win threshold formula.
    pub threshold_policy: ThresholdPolicy,

    // ── Voting ───────────────────────────────────────────────────────────
    /// Minimum share of circulating supply needed to vote (basis points). Default: 1 %.
    pub min_ownership_bps: u32,

    // ── Proposal submission ──────────────────────────────────────────────
    /// Proposals one account may create between resets. Default: 3.
    pub max_proposals_per_window: u32,

    /// Look-back window for the submission limit when the account has no
    /// winning proposal yet. Default: 7 days.
    pub proposal_window_secs: u64,

    /// Circulating supply, in whole tokens, below which nobody may propose.
    /// Default: 1000.
    pub min_circulating_supply_tokens: u64,

    /// Only the N largest holders may propose. Default: 2.
    pub top_proposers: u32,

    // ── Caching ──────────────────────────────────────────────────────────
    /// Number of computed round layouts kept in memory.
    pub round_cache_capacity: usize,
}

impl GovernanceParams {
    pub const DEFAULT_ROUND_DURATION_SECS: u64 = 7 * 24 * 3600;

    /// Short timelines for local demos and tests: one-hour rounds.
    pub fn fast() -> Self {
        Self {
            round_duration_secs: 3600,
            proposal_window_secs: 3600,
            ..Self::default()
        }
    }

    pub fn min_circulating_supply(&self) -> TokenAmount {
        TokenAmount::whole(self.min_circulating_supply_tokens as u128)
    }

    /// Reject parameter combinations the engine cannot work with.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.round_duration_secs == 0 {
            return Err(TallyError::InvalidParam {
                name: "round_duration_secs",
                reason: "must be positive".into(),
            });
        }
        if self.min_ownership_bps > 10_000 {
            return Err(TallyError::InvalidParam {
                name: "min_ownership_bps",
                reason: format!("{} exceeds 10000", self.min_ownership_bps),
            });
        }
        if self.round_cache_capacity == 0 {
            return Err(TallyError::InvalidParam {
                name: "round_cache_capacity",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            round_duration_secs: Self::DEFAULT_ROUND_DURATION_SECS,
            threshold_policy: ThresholdPolicy::HalfCeil,
            min_ownership_bps: 100,
            max_proposals_per_window: 3,
            proposal_window_secs: 7 * 24 * 3600,
            min_circulating_supply_tokens: 1000,
            top_proposers: 2,
            round_cache_capacity: 16,
        }
    }
}
