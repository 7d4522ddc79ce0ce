//! Span constructors for watcher passes, so every log line emitted inside a
//! poll carries the pass number and kind.

use tracing::{info_span, Span};

/// Span covering one poll pass.
pub fn poll_span(pass: u64, kind: &'static str) -> Span {
    info_span!("poll", pass, kind)
}

/// Span covering a single ledger snapshot fetch.
pub fn fetch_span(kind: &'static str) -> Span {
    info_span!("fetch", kind)
}
