//! The ledger read boundary.
//!
//! The ledger is external, append-only and shared by many writers. This crate
//! only reads it: [`LedgerReader`] is the collaborator contract, [`Snapshot`]
//! is one consistent-enough view of it, and [`fetch_snapshot`] builds that
//! view while tolerating partial read failures.

pub mod error;
pub mod file;
pub mod reader;
pub mod snapshot;

pub use error::LedgerError;
pub use file::{FileLedger, LedgerDump};
pub use reader::LedgerReader;
pub use snapshot::{fetch_snapshot, refresh_proposals, ReadFailure, ReadTarget, Snapshot};
