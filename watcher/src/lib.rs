//! Round watcher: keeps recomputed round state current by polling the ledger.
//!
//! The watcher owns a [`tally_governance::RoundEngine`] and a ledger reader,
//! re-reads the ledger on two cadences and publishes each pass's
//! [`tally_governance::RoundSummary`]. It never writes to the ledger; whether
//! to act on an execution candidate is left to whoever subscribes.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod poller;
pub mod shutdown;
pub mod spans;

pub use config::WatcherConfig;
pub use error::WatcherError;
pub use logging::{init_logging, LogFormat};
pub use metrics::WatcherMetrics;
pub use poller::{PollKind, RoundWatcher};
pub use shutdown::{ShutdownController, ShutdownReason, ShutdownSignal};
