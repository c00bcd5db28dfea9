//! Resume planning
//!
//! Decides what a run has to fetch from the checkpoint map and the frontier.
//! The main range always starts right after the highest committed index.

use crate::checkpoint::CheckpointMap;
use crate::IndexRange;
use serde::Serialize;

/// Work plan for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumePlan {
    /// First index of the main range (`max committed + 1`, or 0)
    pub start: u64,
    /// Last index of the main range (the frontier)
    pub end: u64,
    /// Missing runs below the highest committed index, capped at the frontier
    pub gaps: Vec<IndexRange>,
}

impl ResumePlan {
    /// Main range, `None` when `start > end`
    pub fn main_range(&self) -> Option<IndexRange> {
        IndexRange::new(self.start, self.end)
    }

    /// Ranges to fetch in order: gaps first (when backfilling), then the main range
    pub fn segments(&self, backfill_gaps: bool) -> Vec<IndexRange> {
        let gaps: &[IndexRange] = if backfill_gaps { &self.gaps } else { &[] };
        gaps.iter().copied().chain(self.main_range()).collect()
    }

    /// Number of indices a run would fetch
    pub fn planned_count(&self, backfill_gaps: bool) -> u64 {
        self.segments(backfill_gaps).iter().map(IndexRange::len).sum()
    }

    /// Number of indices inside gaps
    pub fn gap_count(&self) -> u64 {
        self.gaps.iter().map(IndexRange::len).sum()
    }
}

/// Plan a run against `frontier`.
///
/// An empty map starts at 0. A map whose highest index already reaches the
/// frontier yields an empty main range.
pub fn plan(map: &CheckpointMap, frontier: u64) -> ResumePlan {
    let start = map.max_index().map_or(0, |max| max.saturating_add(1));

    let gaps = map
        .gaps()
        .into_iter()
        .filter_map(|gap| IndexRange::new(gap.start(), gap.end().min(frontier)))
        .collect();

    ResumePlan {
        start,
        end: frontier,
        gaps,
    }
}
