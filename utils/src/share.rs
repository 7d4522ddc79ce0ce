//! Ownership share formatting.

/// Basis points as a percentage with two decimals, e.g. `125` → `"1.25%"`.
pub fn format_bps(bps: u32) -> String {
    format!("{}.{:02}%", bps / 100, bps % 100)
}
