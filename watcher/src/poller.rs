//! The round watcher poll loop.
//!
//! Two cadences drive it: a short one that re-lists proposals and a longer
//! one that re-reads headcounts, votes and holders. Every tick recomputes the
//! rounds from scratch and publishes the resulting [`RoundSummary`] on a
//! `watch` channel; subscribers always see the latest pass and never a queue
//! of stale ones. Ledger reads are blocking, so they run on the blocking pool.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn, Instrument};

use tally_governance::{Eligibility, ProposalPermission, RoundEngine, RoundSummary};
use tally_ledger::{fetch_snapshot, refresh_proposals, LedgerReader, Snapshot};
use tally_types::{AccountId, Clock, ProposalId};

use crate::metrics::WatcherMetrics;
use crate::shutdown::ShutdownSignal;
use crate::spans::{fetch_span, poll_span};
use crate::{WatcherConfig, WatcherError};

/// How much of the ledger a pass re-reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollKind {
    /// Proposal list only; headcounts of known proposals are reused.
    Proposals,
    /// Everything.
    Full,
}

impl PollKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Proposals => "proposals",
            Self::Full => "full",
        }
    }
}

struct State {
    engine: RoundEngine,
    snapshot: Option<Snapshot>,
    passes: u64,
}

/// Keeps a recomputed [`RoundSummary`] current by polling the ledger.
pub struct RoundWatcher {
    reader: Arc<dyn LedgerReader>,
    clock: Arc<dyn Clock>,
    config: WatcherConfig,
    metrics: Option<Arc<WatcherMetrics>>,
    state: Arc<Mutex<State>>,
    tx: watch::Sender<RoundSummary>,
}

impl RoundWatcher {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        clock: Arc<dyn Clock>,
        config: WatcherConfig,
    ) -> Result<Self, WatcherError> {
        config.validate()?;
        let engine = RoundEngine::new(config.governance.clone())?;
        let metrics = if config.enable_metrics {
            Some(Arc::new(WatcherMetrics::new()?))
        } else {
            None
        };
        let (tx, _) = watch::channel(RoundSummary::default());
        Ok(Self {
            reader,
            clock,
            config,
            metrics,
            state: Arc::new(Mutex::new(State {
                engine,
                snapshot: None,
                passes: 0,
            })),
            tx,
        })
    }

    /// Receiver that always holds the most recent summary.
    pub fn subscribe(&self) -> watch::Receiver<RoundSummary> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> RoundSummary {
        self.tx.borrow().clone()
    }

    pub fn metrics(&self) -> Option<&Arc<WatcherMetrics>> {
        self.metrics.as_ref()
    }

    /// Run one pass: read the ledger, recompute, publish.
    ///
    /// A failed proposal-list read leaves the published summary untouched and
    /// returns the (retryable) error.
    pub async fn poll_once(&self, kind: PollKind) -> Result<RoundSummary, WatcherError> {
        let started = Instant::now();
        let mut state = self.state.lock().await;
        state.passes += 1;
        let span = poll_span(state.passes, kind.as_str());

        let result = async {
            let now = self.clock.now();
            let reader = Arc::clone(&self.reader);
            let previous = state.snapshot.clone();
            let snapshot = tokio::task::spawn_blocking(move || {
                let _guard = fetch_span(kind.as_str()).entered();
                match (kind, previous.as_ref()) {
                    (PollKind::Proposals, Some(prev)) => refresh_proposals(reader.as_ref(), prev, now),
                    _ => fetch_snapshot(reader.as_ref(), previous.as_ref(), now),
                }
            })
            .await
            .map_err(|e| WatcherError::Task(e.to_string()))??;

            let wins_before: BTreeSet<ProposalId> =
                state.engine.registry().timestamps().keys().copied().collect();
            let summary = state.engine.view(&snapshot, now).summary();
            let new_wins = state
                .engine
                .registry()
                .timestamps()
                .keys()
                .filter(|id| !wins_before.contains(id))
                .count() as u64;
            if new_wins > 0 {
                info!(new_wins, "round state changed");
            }
            state.snapshot = Some(snapshot);
            Ok::<_, WatcherError>((summary, new_wins))
        }
        .instrument(span)
        .await;
        drop(state);

        match result {
            Ok((summary, new_wins)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.observe(&summary, new_wins);
                    metrics
                        .poll_duration_ms
                        .observe(started.elapsed().as_secs_f64() * 1000.0);
                }
                debug!(
                    open_rounds = summary.open_rounds(),
                    read_failures = summary.read_failures,
                    "summary published"
                );
                self.tx.send_replace(summary.clone());
                Ok(summary)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.poll_failures.inc();
                }
                warn!(error = %e, retryable = e.is_retryable(), "poll failed");
                Err(e)
            }
        }
    }

    /// Poll until `shutdown` fires. Poll errors are logged and retried on the
    /// next tick; they never stop the loop.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        let mut rounds = tokio::time::interval(self.config.round_poll_interval());
        let mut headcounts = tokio::time::interval(self.config.headcount_poll_interval());
        rounds.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        headcounts.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            round_poll_secs = self.config.round_poll_secs,
            headcount_poll_secs = self.config.headcount_poll_secs,
            "round watcher started"
        );

        loop {
            tokio::select! {
                biased;
                reason = shutdown.recv() => {
                    info!(%reason, "round watcher shutting down");
                    break;
                }
                _ = headcounts.tick() => {
                    let _ = self.poll_once(PollKind::Full).await;
                }
                _ = rounds.tick() => {
                    let _ = self.poll_once(PollKind::Proposals).await;
                }
            }
        }
    }

    /// Eligibility of `account` to vote on `proposal` against the last
    /// fetched snapshot. Ownership and prior votes are read from the ledger.
    pub async fn eligibility(
        &self,
        account: AccountId,
        proposal: ProposalId,
    ) -> Result<Eligibility, WatcherError> {
        let state = Arc::clone(&self.state);
        let reader = Arc::clone(&self.reader);
        let now = self.clock.now();
        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            let State { engine, snapshot, .. } = &mut *state;
            let snapshot = snapshot.as_ref().ok_or(WatcherError::NotReady)?;
            Ok::<_, WatcherError>(engine.get_eligibility(&account, proposal, snapshot, reader.as_ref(), now)?)
        })
        .await
        .map_err(|e| WatcherError::Task(e.to_string()))?
    }

    /// Whether `account` may submit a proposal, against the last snapshot.
    pub async fn can_propose(&self, account: AccountId) -> Result<ProposalPermission, WatcherError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let State { engine, snapshot, .. } = &mut *state;
        let snapshot = snapshot.as_ref().ok_or(WatcherError::NotReady)?;
        Ok(engine.view(snapshot, now).can_propose(&account))
    }

    /// Note a vote this process submitted so eligibility checks can pre-empt
    /// a duplicate before the ledger reports it.
    pub async fn record_local_vote(&self, proposal: ProposalId, voter: AccountId) {
        self.state.lock().await.engine.record_local_vote(proposal, voter);
    }
}
