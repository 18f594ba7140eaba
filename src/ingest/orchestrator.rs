//! Update orchestrator
//!
//! Drives one ingestion run through Fetch -> Parse -> Persist against the
//! source and store ports. The run is strictly sequential: the source must
//! never receive concurrent requests from the same client, so there is no
//! internal parallelism and a second trigger while a run is in flight is
//! rejected outright.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::cbe::parser::{AuctionParser, ParseOutcome};
use crate::common::errors::{PipelineError, Result};
use crate::common::traits::{AuctionStore, YieldSource};
use crate::common::types::RawPayload;
use crate::config::types::IngestConfig;

use super::report::{IngestionReport, RunOutcome, RunState};

/// Run-to-run metadata, passed in explicitly so incremental-mode decisions
/// are testable in isolation (no module-level state)
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub last_outcome: Option<RunOutcome>,
    pub last_success_at: Option<chrono::DateTime<Utc>>,
    pub last_auction_date: Option<NaiveDate>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Coordinates fetcher, parser and store for one ingestion run at a time
pub struct Orchestrator<S, D> {
    source: S,
    store: D,
    policy: IngestConfig,
    parser: AuctionParser,
    state: std::sync::Mutex<RunState>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<S: YieldSource, D: AuctionStore> Orchestrator<S, D> {
    pub fn new(source: S, store: D, policy: IngestConfig) -> Self {
        Self {
            source,
            store,
            policy,
            parser: AuctionParser::new(),
            state: std::sync::Mutex::new(RunState::Idle),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Current phase of the in-flight run (or the terminal phase of the last)
    pub fn state(&self) -> RunState {
        self.state.lock().map(|s| *s).unwrap_or(RunState::Failed)
    }

    fn set_state(&self, next: RunState) {
        if let Ok(mut state) = self.state.lock() {
            info!(?next, "run state transition");
            *state = next;
        }
    }

    /// Access the store this orchestrator persists into
    pub fn store(&self) -> &D {
        &self.store
    }

    /// Execute one ingestion run.
    ///
    /// Fails fast with `RunInFlight` if another run holds the slot. The
    /// whole run is bounded by the configured wall-clock budget; exceeding
    /// it aborts the run with no partial batch committed (persistence is a
    /// single transactional upsert).
    #[instrument(skip(self, ctx))]
    pub async fn run(&self, force_refresh: bool, ctx: &mut RunContext) -> Result<IngestionReport> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| PipelineError::RunInFlight)?;

        let started_at = Utc::now();
        let budget = Duration::from_secs(self.policy.run_budget_secs);
        let report = match tokio::time::timeout(budget, self.execute(force_refresh, ctx, started_at))
            .await
        {
            Ok(report) => report,
            Err(_) => {
                self.set_state(RunState::Failed);
                IngestionReport::failed(
                    started_at,
                    0,
                    0,
                    &PipelineError::RunBudgetExceeded(self.policy.run_budget_secs),
                )
            }
        };

        ctx.last_outcome = Some(report.outcome);
        if matches!(
            report.outcome,
            RunOutcome::Ingested | RunOutcome::PartialSuccess | RunOutcome::NoNewData
        ) {
            ctx.last_success_at = Some(report.finished_at);
        }
        if let Ok(Some(date)) = self.store.latest_auction_date().await {
            ctx.last_auction_date = Some(date);
        }

        info!(outcome = ?report.outcome, "{}", report.summary());
        Ok(report)
    }

    async fn execute(
        &self,
        force_refresh: bool,
        ctx: &RunContext,
        started_at: chrono::DateTime<Utc>,
    ) -> IngestionReport {
        self.set_state(RunState::Idle);

        // Incremental mode: skip fetching while the newest known record is
        // still within the source's publication cadence. The context answers
        // first; the store is consulted when this process has no run history.
        if !force_refresh {
            let known_latest = match ctx.last_auction_date {
                Some(date) => Some(date),
                None => match self.store.latest_auction_date().await {
                    Ok(date) => date,
                    Err(err) => {
                        self.set_state(RunState::Failed);
                        return IngestionReport::failed(started_at, 0, 0, &err);
                    }
                },
            };
            if let Some(latest) = known_latest {
                if self.within_cadence(latest) {
                    info!(%latest, "stored data is current; skipping fetch");
                    self.set_state(RunState::Succeeded);
                    return IngestionReport::no_new_data(started_at, 0, 0);
                }
            }
        }

        self.set_state(RunState::Fetching);
        let (attempts, fetched) = self.fetch_with_retry().await;
        let payload = match fetched {
            Ok(payload) => payload,
            Err(err) => {
                self.set_state(RunState::Failed);
                return IngestionReport::failed(started_at, attempts, 0, &err);
            }
        };

        self.set_state(RunState::Parsing);
        let outcome = match self.parser.parse(&payload) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.set_state(RunState::Failed);
                return IngestionReport::failed(started_at, attempts, 0, &err);
            }
        };

        if outcome.rows_seen > 0 && outcome.records.is_empty() {
            // Never report a fully-rejected payload as "no new data": the
            // source changed shape and downstream data would be silently wrong.
            let err = PipelineError::SchemaDrift(format!(
                "all {} rows of a non-empty payload were rejected",
                outcome.rows_seen
            ));
            self.set_state(RunState::Failed);
            let mut report = IngestionReport::failed(started_at, attempts, outcome.rows_seen, &err);
            report.rejected = outcome.rejected;
            return report;
        }

        if outcome.rows_seen == 0 {
            self.set_state(RunState::Succeeded);
            return IngestionReport::no_new_data(started_at, attempts, 0);
        }

        // The source is only consulted for new sessions; identical latest
        // dates mean nothing to persist unless a refresh is forced.
        if !force_refresh {
            if let Some(newest_parsed) = newest_auction_date(&outcome) {
                if let Ok(Some(newest_stored)) = self.store.latest_auction_date().await {
                    if newest_parsed <= newest_stored {
                        self.set_state(RunState::Succeeded);
                        return IngestionReport::no_new_data(started_at, attempts, outcome.rows_seen);
                    }
                }
            }
        }

        self.set_state(RunState::Persisting);
        match self.store.upsert_many(&outcome.records).await {
            Ok(stored) => {
                self.set_state(RunState::Succeeded);
                let run_outcome = if outcome.rejected.is_empty() {
                    RunOutcome::Ingested
                } else {
                    RunOutcome::PartialSuccess
                };
                IngestionReport {
                    outcome: run_outcome,
                    rows_seen: outcome.rows_seen,
                    parsed: outcome.records.len(),
                    stored,
                    rejected: outcome.rejected,
                    attempts,
                    started_at,
                    finished_at: Utc::now(),
                    error: None,
                }
            }
            Err(err) => {
                self.set_state(RunState::Failed);
                let mut report =
                    IngestionReport::failed(started_at, attempts, outcome.rows_seen, &err);
                report.rejected = outcome.rejected;
                report
            }
        }
    }

    /// Bounded exponential backoff for transient acquisition failures.
    /// `SourceBlocked` is surfaced immediately: it signals a policy issue,
    /// not transient trouble.
    async fn fetch_with_retry(&self) -> (u32, Result<RawPayload>) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.source.fetch_latest_listing().await {
                Ok(payload) => return (attempt, Ok(payload)),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = backoff_delay(
                        attempt,
                        self.policy.retry_base_ms,
                        self.policy.retry_cap_ms,
                    );
                    warn!(attempt, ?delay, %err, "fetch failed; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return (attempt, Err(err)),
            }
        }
    }

    fn within_cadence(&self, latest: NaiveDate) -> bool {
        let age = Utc::now().date_naive() - latest;
        age < ChronoDuration::days(i64::from(self.policy.publication_cadence_days))
    }
}

fn newest_auction_date(outcome: &ParseOutcome) -> Option<NaiveDate> {
    outcome.records.iter().map(|r| r.auction_date).max()
}

/// Delay before retry `attempt` (1-based): base doubled per attempt, capped
fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let shift = (attempt - 1).min(16);
    let delay = base_ms.saturating_mul(1u64 << shift);
    Duration::from_millis(delay.min(cap_ms))
}
