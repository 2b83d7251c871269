//! Per-mapping and aggregate accounting.
//!
//! `MappingStats` is the shared mutable accumulator record workers write to;
//! it collapses into an immutable [`MappingResult`] when a mapping finishes.
//! For every result, `processed == created + updated + skipped + errors`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Classification of one record's fate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
    Error,
}

/// Lifecycle of one mapping within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingState {
    Pending,
    Running,
    Completed,
    /// A mapping-level fatal condition before any record work, e.g. loader
    /// construction or the very first fetch failing.
    Failed,
}

/// Thread-safe counters for one running mapping.
pub struct MappingStats {
    mapping_id: String,
    collection: String,
    state: Mutex<MappingState>,
    processed: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
    details: Mutex<Vec<String>>,
    detail_cap: usize,
    started: Instant,
}

impl MappingStats {
    pub fn new(mapping_id: &str, collection: &str, detail_cap: usize) -> Self {
        Self {
            mapping_id: mapping_id.to_string(),
            collection: collection.to_string(),
            state: Mutex::new(MappingState::Pending),
            processed: AtomicU64::new(0),
            created: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            details: Mutex::new(Vec::new()),
            detail_cap,
            started: Instant::now(),
        }
    }

    pub fn mark_running(&self) {
        *self.state.lock() = MappingState::Running;
    }

    /// Count one record. `processed` moves in lockstep with the outcome
    /// bucket, which is what keeps the accounting invariant true under
    /// concurrent increments.
    pub fn record(&self, outcome: Outcome, detail: Option<String>) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let bucket = match outcome {
            Outcome::Created => &self.created,
            Outcome::Updated => &self.updated,
            Outcome::Skipped => &self.skipped,
            Outcome::Error => &self.errors,
        };
        bucket.fetch_add(1, Ordering::Relaxed);

        if outcome == Outcome::Error {
            if let Some(detail) = detail {
                let mut details = self.details.lock();
                if details.len() < self.detail_cap {
                    details.push(detail);
                }
            }
        }
    }

    pub fn record_error(&self, detail: impl Into<String>) {
        self.record(Outcome::Error, Some(detail.into()));
    }

    /// Collapse into the final result. Consumes nothing; the stats simply
    /// stop receiving increments once all record workers are done.
    pub fn finish(&self, state: MappingState) -> MappingResult {
        *self.state.lock() = state;
        MappingResult {
            mapping_id: self.mapping_id.clone(),
            collection: self.collection.clone(),
            state,
            processed: self.processed.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            error_details: self.details.lock().clone(),
            duration: self.started.elapsed(),
        }
    }
}

/// Final accounting for one mapping.
#[derive(Debug, Clone, Serialize)]
pub struct MappingResult {
    pub mapping_id: String,
    pub collection: String,
    pub state: MappingState,
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    /// First N error messages; errors past the cap are counted but dropped.
    pub error_details: Vec<String>,
    pub duration: Duration,
}

impl MappingResult {
    pub fn accounting_holds(&self) -> bool {
        self.processed == self.created + self.updated + self.skipped + self.errors
    }
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunResult {
    pub results: Vec<MappingResult>,
    pub total_processed: u64,
    pub total_created: u64,
    pub total_updated: u64,
    pub total_skipped: u64,
    pub total_errors: u64,
    pub duration: Duration,
    pub success: bool,
    /// Set when the run stopped on the cancellation signal rather than
    /// running to completion.
    pub cancelled: bool,
}

impl PipelineRunResult {
    pub fn from_results(
        results: Vec<MappingResult>,
        duration: Duration,
        cancelled: bool,
    ) -> Self {
        let total_processed = results.iter().map(|r| r.processed).sum();
        let total_created = results.iter().map(|r| r.created).sum();
        let total_updated = results.iter().map(|r| r.updated).sum();
        let total_skipped = results.iter().map(|r| r.skipped).sum();
        let total_errors: u64 = results.iter().map(|r| r.errors).sum();
        let all_completed = results
            .iter()
            .all(|r| r.state == MappingState::Completed);
        Self {
            results,
            total_processed,
            total_created,
            total_updated,
            total_skipped,
            total_errors,
            duration,
            success: total_errors == 0 && all_completed && !cancelled,
            cancelled,
        }
    }
}
