//! Structured reporting for ingestion runs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cbe::parser::RejectedRow;
use crate::common::errors::PipelineError;

/// Phases of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Parsing,
    Persisting,
    Succeeded,
    Failed,
}

/// Operator-facing outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every parsed record was persisted
    Ingested,
    /// Records persisted, but some rows were rejected
    PartialSuccess,
    /// The source had nothing newer than the store
    NoNewData,
    Failed,
}

/// Result of one ingestion run, consumable by schedulers and dashboards
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub outcome: RunOutcome,
    /// Data rows seen in the fetched payload
    pub rows_seen: usize,
    /// Rows that parsed into valid records
    pub parsed: usize,
    /// Records committed to the store
    pub stored: u64,
    /// Per-row rejection detail
    pub rejected: Vec<RejectedRow>,
    /// Fetch attempts spent (0 when incremental mode skipped fetching)
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Failure detail, present iff outcome is `Failed`
    pub error: Option<String>,
}

impl IngestionReport {
    pub(crate) fn no_new_data(started_at: DateTime<Utc>, attempts: u32, rows_seen: usize) -> Self {
        Self {
            outcome: RunOutcome::NoNewData,
            rows_seen,
            parsed: 0,
            stored: 0,
            rejected: Vec::new(),
            attempts,
            started_at,
            finished_at: Utc::now(),
            error: None,
        }
    }

    pub(crate) fn failed(
        started_at: DateTime<Utc>,
        attempts: u32,
        rows_seen: usize,
        error: &PipelineError,
    ) -> Self {
        Self {
            outcome: RunOutcome::Failed,
            rows_seen,
            parsed: 0,
            stored: 0,
            rejected: Vec::new(),
            attempts,
            started_at,
            finished_at: Utc::now(),
            error: Some(error.to_string()),
        }
    }

    /// Exit signal: 0 success or no new data, 1 failure, 2 partial success
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Ingested | RunOutcome::NoNewData => 0,
            RunOutcome::PartialSuccess => 2,
            RunOutcome::Failed => 1,
        }
    }

    /// One operator-readable line; each outcome reads differently so no
    /// log inspection is needed to tell them apart
    pub fn summary(&self) -> String {
        match self.outcome {
            RunOutcome::NoNewData => "no new data".to_string(),
            RunOutcome::Ingested => format!("ingested {} records", self.stored),
            RunOutcome::PartialSuccess => format!(
                "ingested {} records, rejected {} rows (schema drift suspected)",
                self.stored,
                self.rejected.len()
            ),
            RunOutcome::Failed => format!(
                "ingestion failed ({})",
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_outcomes() {
        let base = IngestionReport::no_new_data(Utc::now(), 0, 0);
        assert_eq!(base.exit_code(), 0);

        let mut ingested = base.clone();
        ingested.outcome = RunOutcome::Ingested;
        assert_eq!(ingested.exit_code(), 0);

        let mut partial = base.clone();
        partial.outcome = RunOutcome::PartialSuccess;
        assert_eq!(partial.exit_code(), 2);

        let failed =
            IngestionReport::failed(Utc::now(), 1, 0, &PipelineError::SourceUnavailable("x".into()));
        assert_eq!(failed.exit_code(), 1);
    }

    #[test]
    fn summaries_are_distinguishable() {
        let no_new = IngestionReport::no_new_data(Utc::now(), 0, 0);
        let failed =
            IngestionReport::failed(Utc::now(), 3, 0, &PipelineError::SourceUnavailable("dns".into()));
        assert_ne!(no_new.summary(), failed.summary());
        assert!(failed.summary().contains("failed"));
    }
}
