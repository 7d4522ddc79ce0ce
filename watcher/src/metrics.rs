//! Prometheus metrics for the round watcher.
//!
//! [`WatcherMetrics`] owns a dedicated [`Registry`] that an exporter can
//! encode into the Prometheus text exposition format via
//! [`WatcherMetrics::encode`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use tally_governance::RoundSummary;

use crate::WatcherError;

pub struct WatcherMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Poll passes that produced a summary.
    pub polls: IntCounter,
    /// Poll passes that failed outright (proposal list unreadable).
    pub poll_failures: IntCounter,
    /// Individual ledger reads that failed inside otherwise successful passes.
    pub read_failures: IntCounter,
    /// Early wins recognized since start.
    pub early_wins: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub open_rounds: IntGauge,
    pub proposals: IntGauge,
    pub eligible_holders: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of a poll pass, in milliseconds.
    pub poll_duration_ms: Histogram,
}

impl WatcherMetrics {
    pub fn new() -> Result<Self, WatcherError> {
        let registry = Registry::new();

        let polls = register_int_counter_with_registry!(
            Opts::new("tally_polls_total", "Poll passes completed"),
            registry
        )?;
        let poll_failures = register_int_counter_with_registry!(
            Opts::new("tally_poll_failures_total", "Poll passes that failed"),
            registry
        )?;
        let read_failures = register_int_counter_with_registry!(
            Opts::new(
                "tally_read_failures_total",
                "Ledger reads that failed within a pass"
            ),
            registry
        )?;
        let early_wins = register_int_counter_with_registry!(
            Opts::new("tally_early_wins_total", "Early wins recognized"),
            registry
        )?;

        let open_rounds = register_int_gauge_with_registry!(
            Opts::new("tally_open_rounds", "Rounds currently accepting votes"),
            registry
        )?;
        let proposals = register_int_gauge_with_registry!(
            Opts::new("tally_proposals", "Real proposals on the ledger"),
            registry
        )?;
        let eligible_holders = register_int_gauge_with_registry!(
            Opts::new(
                "tally_eligible_holders",
                "Holders at or above the voting floor"
            ),
            registry
        )?;

        let poll_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new("tally_poll_duration_ms", "Poll pass time in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 14)?),
            registry
        )?;

        Ok(Self {
            registry,
            polls,
            poll_failures,
            read_failures,
            early_wins,
            open_rounds,
            proposals,
            eligible_holders,
            poll_duration_ms,
        })
    }

    /// Fold one pass's summary into the gauges. `new_wins` is the number of
    /// early wins first seen in this pass.
    pub fn observe(&self, summary: &RoundSummary, new_wins: u64) {
        self.polls.inc();
        self.read_failures.inc_by(summary.read_failures as u64);
        self.early_wins.inc_by(new_wins);
        self.open_rounds.set(summary.open_rounds() as i64);
        self.proposals.set(summary.proposals as i64);
        self.eligible_holders.set(summary.eligible_holders as i64);
    }

    /// Text exposition of every metric.
    pub fn encode(&self) -> Result<String, WatcherError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| WatcherError::Config(e.to_string()))
    }
}
