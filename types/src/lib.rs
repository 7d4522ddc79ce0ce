//! Fundamental types for the tally round-reconciliation engine.
//!
//! This crate defines the ledger facts shared by every other crate in the
//! workspace: account ids, proposal records, token amounts, timestamps and the
//! governance parameters that shape rounds and voting eligibility.

pub mod address;
pub mod amount;
pub mod error;
pub mod params;
pub mod proposal;
pub mod time;

pub use address::AccountId;
pub use amount::{HolderBalance, TokenAmount, TOKEN_UNIT};
pub use error::TallyError;
pub use params::{GovernanceParams, ThresholdPolicy};
pub use proposal::{Proposal, ProposalId, VoteRecord};
pub use time::{Clock, SystemClock, Timestamp};
