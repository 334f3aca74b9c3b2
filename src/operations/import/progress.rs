//! Progress aggregation across stages
//!
//! Each stage owns a fixed sub-range of the overall percentage, so the
//! session-wide signal stays monotonic even though completion order inside
//! a stage is arbitrary.

use crate::operations::import::context::{ImportContext, ImportProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Hash,
    Copy,
    Validate,
    Finalize,
}

impl Stage {
    /// (start, end) of this stage's slice of the 0–100 signal
    pub fn range(&self) -> (f32, f32) {
        match self {
            Stage::Scan => (0.0, 10.0),
            Stage::Hash => (10.0, 40.0),
            Stage::Copy => (40.0, 80.0),
            Stage::Validate => (80.0, 95.0),
            Stage::Finalize => (95.0, 100.0),
        }
    }

    /// Map within-stage completion into the session-wide percentage
    pub fn percent(&self, done: u64, total: u64) -> f32 {
        let (lo, hi) = self.range();
        if total == 0 {
            return hi;
        }
        let fraction = (done as f32 / total as f32).clamp(0.0, 1.0);
        lo + (hi - lo) * fraction
    }
}

/// Session-wide counters, updated on each stage's consumer loop and
/// snapshotted into every progress record.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    pub files_total: u64,
    pub bytes_total: u64,
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub duplicates_found: u64,
    pub errors_found: u64,
}

impl ProgressReporter {
    pub fn new(files_total: u64, bytes_total: u64) -> Self {
        Self {
            files_total,
            bytes_total,
            ..Default::default()
        }
    }

    /// Reset the per-stage completion counter; totals and session counters
    /// carry over.
    pub fn begin_stage(&mut self) {
        self.files_processed = 0;
    }

    pub fn emit(
        &self,
        ctx: &ImportContext,
        stage: Stage,
        done: u64,
        total: u64,
        current_file: Option<String>,
    ) {
        ctx.emit(&ImportProgress {
            percent: stage.percent(done, total),
            current_file,
            files_processed: self.files_processed,
            files_total: self.files_total,
            bytes_processed: self.bytes_processed,
            bytes_total: self.bytes_total,
            duplicates_found: self.duplicates_found,
            errors_found: self.errors_found,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_ranges_tile_the_signal() {
        let stages = [Stage::Scan, Stage::Hash, Stage::Copy, Stage::Validate, Stage::Finalize];
        let mut last_end = 0.0;
        for stage in stages {
            let (lo, hi) = stage.range();
            assert_eq!(lo, last_end);
            assert!(hi > lo);
            last_end = hi;
        }
        assert_eq!(last_end, 100.0);
    }

    #[test]
    fn percent_is_monotonic_within_a_stage() {
        let mut last = 0.0;
        for done in 0..=10 {
            let pct = Stage::Copy.percent(done, 10);
            assert!(pct >= last);
            last = pct;
        }
        assert_eq!(Stage::Copy.percent(10, 10), 80.0);
        // Empty stage jumps straight to its end
        assert_eq!(Stage::Validate.percent(0, 0), 95.0);
    }
}
