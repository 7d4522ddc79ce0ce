//! Display helpers shared by the tally binaries.

pub mod share;
pub mod time;

pub use share::format_bps;
pub use time::{format_duration, format_relative};
