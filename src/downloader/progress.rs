//! Progress reporting for long-running syncs.
//!
//! Computes percentage, throughput and ETA over the planned index count and
//! formats the `[PROGRESS]` lines the executor logs between waves.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const MIN_SYNC_DURATION: Duration = Duration::from_secs(30);

/// Controls how often progress lines are emitted.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    update_interval: Duration,
    min_percentage_step: f64,
}

impl ProgressTracker {
    /// Create a tracker with custom interval and percentage step.
    pub fn new(update_interval: Duration, min_percentage_step: f64) -> Self {
        Self {
            update_interval,
            min_percentage_step,
        }
    }

    /// Build a [`ProgressState`] for `total_expected` blocks.
    pub fn create_state(&self, total_expected: u64) -> ProgressState {
        let mut state = ProgressState::new(total_expected);
        state.update_interval = self.update_interval;
        state.min_percentage_step = self.min_percentage_step;
        state
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL, 10.0)
    }
}

/// Progress of one sync run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Blocks processed so far (committed or failed).
    pub blocks_processed: u64,
    /// Blocks committed so far.
    pub blocks_committed: u64,
    /// Blocks planned for this run.
    pub total_expected: u64,
    /// When the run started.
    pub start_time: Instant,
    /// Last time progress was reported.
    pub last_update: Instant,
    /// Minimum interval between time-based updates.
    pub update_interval: Duration,
    /// Processing rate in blocks per second.
    pub current_rate: f64,
    /// Last reported completion percentage.
    pub last_reported_percentage: f64,
    /// Minimum percentage delta that triggers an update.
    pub min_percentage_step: f64,
    /// Highest block committed so far.
    pub last_block: Option<u64>,
}

impl ProgressState {
    /// Fresh state with default intervals.
    pub fn new(total_expected: u64) -> Self {
        let now = Instant::now();
        Self {
            blocks_processed: 0,
            blocks_committed: 0,
            total_expected,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            current_rate: 0.0,
            last_reported_percentage: 0.0,
            min_percentage_step: 10.0,
            last_block: None,
        }
    }

    /// Account for a finished wave.
    pub fn update(&mut self, processed: u64, committed: u64, last_block: Option<u64>) {
        self.blocks_processed = self.blocks_processed.saturating_add(processed);
        self.blocks_committed = self.blocks_committed.saturating_add(committed);
        if last_block.is_some() {
            self.last_block = last_block;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.current_rate = self.blocks_processed as f64 / elapsed;
        }
    }

    /// Whether a progress line is due, by percentage step or by time.
    pub fn should_emit_update(&self) -> bool {
        if self.blocks_processed == 0 {
            return false;
        }

        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }

        self.start_time.elapsed() >= MIN_SYNC_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Reset timers and the cached percentage after emitting.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Completion percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_expected == 0 {
            return 100.0;
        }
        (self.blocks_processed as f64 / self.total_expected as f64) * 100.0
    }

    /// Estimated time to finish at the current rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let remaining = self.total_expected.saturating_sub(self.blocks_processed);
        if remaining == 0 || self.current_rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / self.current_rate))
    }

    /// Human-readable progress line.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![
            format!(
                "[PROGRESS] Committed {} of {} blocks",
                self.blocks_committed, self.total_expected
            ),
            format!("- {:.1}% complete", self.percentage()),
        ];

        if let Some(block) = self.last_block {
            parts.push(format!("(at block {block})"));
        }

        if self.current_rate > 0.0 {
            parts.push(format!("at {:.0} blocks/sec", self.current_rate));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
