//! Nullable infrastructure for deterministic testing.
//!
//! The clock and the ledger are abstracted behind traits
//! ([`tally_types::Clock`], [`tally_ledger::LedgerReader`]). This crate
//! provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected read failures
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;

pub use clock::NullClock;
pub use ledger::{FailureMode, NullLedger};
