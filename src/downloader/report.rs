//! Run status and the report returned by a sync

use super::planner::ResumePlan;
use crate::IndexRange;
use serde::Serialize;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every planned wave was fetched and committed
    Completed,
    /// Nothing to fetch; the store already reaches the frontier
    AlreadySynced,
    /// Shutdown requested; committed waves are durable, the rest is left for the next run
    Interrupted,
}

impl RunStatus {
    /// Lowercase label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::AlreadySynced => "already_synced",
            Self::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Endpoint the blocks were fetched from
    pub endpoint: String,
    /// Frontier used for planning (after any `--to-block` cap)
    pub frontier: u64,
    /// Main range `[max committed + 1, frontier]`, if non-empty
    pub planned_range: Option<IndexRange>,
    /// Gap ranges scheduled ahead of the main range
    pub planned_gaps: Vec<IndexRange>,
    /// Indices scheduled for this run
    pub planned: u64,
    /// Records durably committed by this run
    pub committed: u64,
    /// Indices whose fetch failed
    pub failed: u64,
    /// Waves dispatched and committed
    pub waves: u64,
    /// Highest index committed by this run
    pub last_committed: Option<u64>,
    /// How the run ended
    pub status: RunStatus,
}

impl SyncReport {
    pub(crate) fn new(endpoint: &str, frontier: u64, plan: &ResumePlan, backfill_gaps: bool) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            frontier,
            planned_range: plan.main_range(),
            planned_gaps: if backfill_gaps { plan.gaps.clone() } else { Vec::new() },
            planned: plan.planned_count(backfill_gaps),
            committed: 0,
            failed: 0,
            waves: 0,
            last_committed: None,
            status: RunStatus::AlreadySynced,
        }
    }

    /// Whether the run ended without a shutdown request
    pub fn is_complete(&self) -> bool {
        self.status != RunStatus::Interrupted
    }
}
