//! Version Comparator: orders two snapshots chronologically, segments them,
//! diffs them, and aggregates the result.
//!
//! [`VersionComparator`] holds no per-request state; one instance can serve
//! any number of concurrent comparisons.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Deserialize;
use tracing::debug;

use dv_core::{DvError, Result, TextSnapshot};

use crate::aggregate::{aggregate, preview, VersionDelta};
use crate::diff::{diff, ChangeRun, RunText};
use crate::result::ComparisonReport;
use crate::tokenize::{segment, Granularity, Segment};

// ---------------------------------------------------------------------------
// CompareConfig
// ---------------------------------------------------------------------------

/// Runtime configuration for the comparator.
///
/// Deserialises from a JSON options object; missing keys take their default
/// and unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareConfig {
    /// Number of changed runs kept in a preview. Default: 10.
    pub preview_limit: usize,
    /// Character budget per preview entry. Default: 100.
    pub preview_max_chars: usize,
    /// Upper bound on the unit count of either operand. Default: unbounded.
    pub max_units: Option<usize>,
    /// Wall-clock budget for the diff, in milliseconds. When it runs out the
    /// diff degrades to a coarser edit script instead of failing.
    pub deadline_ms: Option<u64>,
    /// Number of rayon worker threads used by [`VersionComparator::compare_many`].
    /// Must be at least 1. Default: `rayon::current_num_threads()`, which
    /// runs batches on the global pool.
    pub worker_threads: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            preview_limit: 10,
            preview_max_chars: 100,
            max_units: None,
            deadline_ms: None,
            worker_threads: rayon::current_num_threads(),
        }
    }
}

impl CompareConfig {
    /// Parse an options object. A blank string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DvError::InvalidInput(format!("invalid compare options: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(DvError::InvalidInput(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// VersionComparator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct VersionComparator {
    config: CompareConfig,
    /// Dedicated batch pool, built on first use when `worker_threads`
    /// differs from the global pool size. Clones share it.
    pool: Arc<OnceLock<rayon::ThreadPool>>,
}

impl VersionComparator {
    pub fn new(config: CompareConfig) -> Self {
        Self { config, pool: Arc::default() }
    }

    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    /// Compare two snapshots, older first regardless of argument order.
    ///
    /// # Steps
    /// 1. Validate both snapshots.
    /// 2. Order them by [`TextSnapshot::chronological_cmp`].
    /// 3. Segment both contents (missing content reads as `""`).
    /// 4. Enforce `max_units`.
    /// 5. Diff, unless the contents are identical.
    /// 6. Aggregate stats.
    pub fn compare(
        &self,
        a: &TextSnapshot,
        b: &TextSnapshot,
        granularity: Granularity,
    ) -> Result<ComparisonReport> {
        let start = Instant::now();

        a.validate()?;
        b.validate()?;

        let (from, to) = if a.chronological_cmp(b).is_gt() { (b, a) } else { (a, b) };

        let old_segments = segment(from.content(), granularity);
        let new_segments = segment(to.content(), granularity);
        let old_units = unit_count(&old_segments);
        let new_units = unit_count(&new_segments);
        self.check_size(old_units.max(new_units))?;

        let runs = if from.content() == to.content() {
            unchanged_runs(&old_segments)
        } else {
            let deadline = self
                .config
                .deadline_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms));
            diff(&old_segments, &new_segments, deadline)
        };
        let stats = aggregate(&runs);

        debug!(
            from = %from.id,
            to = %to.id,
            %granularity,
            old_units,
            new_units,
            runs = runs.len(),
            total_changes = stats.total_changes,
            elapsed_us = start.elapsed().as_micros() as u64,
            "compared snapshots"
        );

        Ok(ComparisonReport {
            from_snapshot: from.clone(),
            to_snapshot: to.clone(),
            granularity,
            runs,
            stats,
        })
    }

    /// [`compare`](Self::compare) with the granularity given as `"lines"` or
    /// `"words"`. The string is parsed before any content is touched.
    pub fn compare_str(
        &self,
        a: &TextSnapshot,
        b: &TextSnapshot,
        granularity: &str,
    ) -> Result<ComparisonReport> {
        let granularity = Granularity::from_str(granularity)?;
        self.compare(a, b, granularity)
    }

    /// Run independent comparisons in parallel, returning results in input
    /// order. Each pair succeeds or fails on its own.
    pub fn compare_many(
        &self,
        pairs: &[(TextSnapshot, TextSnapshot)],
        granularity: Granularity,
    ) -> Result<Vec<Result<ComparisonReport>>> {
        let run = || -> Vec<Result<ComparisonReport>> {
            pairs
                .par_iter()
                .map(|(a, b)| self.compare(a, b, granularity))
                .collect()
        };

        match self.worker_pool()? {
            Some(pool) => {
                debug!(pairs = pairs.len(), threads = pool.current_num_threads(), "batch compare");
                Ok(pool.install(run))
            }
            None => {
                debug!(pairs = pairs.len(), threads = rayon::current_num_threads(), "batch compare");
                Ok(run())
            }
        }
    }

    /// Line-mode and word-mode reports for the same pair, computed concurrently.
    pub fn compare_both(
        &self,
        a: &TextSnapshot,
        b: &TextSnapshot,
    ) -> Result<(ComparisonReport, ComparisonReport)> {
        let (lines, words) = rayon::join(
            || self.compare(a, b, Granularity::Lines),
            || self.compare(a, b, Granularity::Words),
        );
        Ok((lines?, words?))
    }

    /// Upload-style summary of the change between two snapshots.
    pub fn delta(&self, a: &TextSnapshot, b: &TextSnapshot) -> Result<VersionDelta> {
        let (lines, words) = self.compare_both(a, b)?;
        let entries = preview(
            &lines.runs,
            self.config.preview_limit,
            self.config.preview_max_chars,
        );
        Ok(VersionDelta::new(
            lines.from_snapshot.version_number,
            lines.to_snapshot.version_number,
            lines.stats,
            words.stats,
            entries,
        ))
    }

    /// `None` means the global rayon pool already has the requested size.
    fn worker_pool(&self) -> Result<Option<&rayon::ThreadPool>> {
        self.config.validate()?;
        let threads = self.config.worker_threads;
        if threads == rayon::current_num_threads() {
            return Ok(None);
        }
        if let Some(pool) = self.pool.get() {
            return Ok(Some(pool));
        }
        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| DvError::Internal(format!("failed to build worker pool: {e}")))?;
        Ok(Some(self.pool.get_or_init(|| built)))
    }

    fn check_size(&self, units: usize) -> Result<()> {
        match self.config.max_units {
            Some(limit) if units > limit => Err(DvError::InputTooLarge { units, limit }),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn unit_count(segments: &[Segment<'_>]) -> usize {
    segments.iter().filter(|s| s.is_unit()).count()
}

fn unchanged_runs(segments: &[Segment<'_>]) -> Vec<ChangeRun> {
    if segments.is_empty() {
        Vec::new()
    } else {
        vec![ChangeRun::Unchanged(RunText::from_segments(segments))]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
