//! Time formatting helpers.

use tally_types::Timestamp;

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// `at` relative to `now`: "in 2h 5m", "3d 1h ago" or "now".
pub fn format_relative(at: Timestamp, now: Timestamp) -> String {
    let (at, now) = (at.as_secs(), now.as_secs());
    if at > now {
        format!("in {}", format_duration(at - now))
    } else if at < now {
        format!("{} ago", format_duration(now - at))
    } else {
        "now".to_string()
    }
}
