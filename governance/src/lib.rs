//! Round reconciliation for token-holder governance.
//!
//! Proposals are folded into investment rounds; a round closes early the
//! moment one proposal's supporter headcount reaches the threshold of
//! eligible holders (one holder = one vote, not stake-weighted), or
//! naturally after its nominal duration. Everything here is recomputed from
//! a ledger [`Snapshot`](tally_ledger::Snapshot) on each pass; the only state
//! kept between passes is the registry of recognized winners and a cache.

pub mod cache;
pub mod early_win;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod registry;
pub mod round;
pub mod status;
pub mod submission;

pub use cache::RoundCache;
pub use eligibility::{Eligibility, EligibilityGate, EligibilityReason};
pub use engine::{RoundEngine, RoundSummary, RoundView};
pub use error::GovernanceError;
pub use registry::{LocalVoteLog, WinnerRegistry};
pub use round::{partition, Round};
pub use status::{status_of, ProposalStatus};
pub use submission::{can_propose, PermissionReason, ProposalPermission};
