//! Change aggregation: unit statistics, preview lists, and the upload-time
//! change summary.

use serde::{Deserialize, Serialize};

use crate::diff::{ChangeKind, ChangeRun};

// ---------------------------------------------------------------------------
// ComparisonStats
// ---------------------------------------------------------------------------

/// Aggregate counts for one comparison.
///
/// `additions` and `deletions` count units (lines or words); `total_changes`
/// counts Added and Removed *runs*.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonStats {
    pub additions: usize,
    pub deletions: usize,
    pub total_changes: usize,
}

/// Walk the runs once and compute [`ComparisonStats`].
pub fn aggregate(runs: &[ChangeRun]) -> ComparisonStats {
    runs.iter().fold(ComparisonStats::default(), |mut stats, run| {
        match run {
            ChangeRun::Added(_) => {
                stats.additions += run.count();
                stats.total_changes += 1;
            }
            ChangeRun::Removed(_) => {
                stats.deletions += run.count();
                stats.total_changes += 1;
            }
            ChangeRun::Unchanged(_) => {}
        }
        stats
    })
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Marker appended to a preview value that was cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// A truncated Added/Removed run for UI preview panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewEntry {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
    pub count: usize,
    pub truncated: bool,
}

impl PreviewEntry {
    pub fn kind(&self) -> ChangeKind {
        match (self.added, self.removed) {
            (Some(true), _) => ChangeKind::Added,
            (_, Some(true)) => ChangeKind::Removed,
            _ => ChangeKind::Unchanged,
        }
    }
}

/// The first `limit` changed runs, each cut to at most `max_chars` characters.
///
/// Lossy by construction; never feed the result back into statistics.
pub fn preview(runs: &[ChangeRun], limit: usize, max_chars: usize) -> Vec<PreviewEntry> {
    runs.iter()
        .filter(|run| run.is_change())
        .take(limit)
        .map(|run| {
            let (value, truncated) = truncate_chars(run.value(), max_chars);
            PreviewEntry {
                value,
                added: matches!(run, ChangeRun::Added(_)).then_some(true),
                removed: matches!(run, ChangeRun::Removed(_)).then_some(true),
                count: run.count(),
                truncated,
            }
        })
        .collect()
}

fn truncate_chars(value: &str, max_chars: usize) -> (String, bool) {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => (format!("{}{}", &value[..cut], TRUNCATION_MARKER), true),
        None => (value.to_string(), false),
    }
}

// ---------------------------------------------------------------------------
// ChangeMagnitude / VersionDelta
// ---------------------------------------------------------------------------

/// Coarse size of a change, judged by changed words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeMagnitude {
    Minor,
    Moderate,
    Major,
}

impl ChangeMagnitude {
    pub fn from_word_changes(total_word_changes: usize) -> Self {
        if total_word_changes > 50 {
            ChangeMagnitude::Major
        } else if total_word_changes > 10 {
            ChangeMagnitude::Moderate
        } else {
            ChangeMagnitude::Minor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeMagnitude::Minor => "minor",
            ChangeMagnitude::Moderate => "moderate",
            ChangeMagnitude::Major => "major",
        }
    }
}

/// Line and word unit totals for an upload.
///
/// Totals here are unit totals (added + removed), unlike
/// [`ComparisonStats::total_changes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaStats {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub total_line_changes: usize,
    pub words_added: usize,
    pub words_removed: usize,
    pub total_word_changes: usize,
}

impl DeltaStats {
    pub fn new(lines: ComparisonStats, words: ComparisonStats) -> Self {
        Self {
            lines_added: lines.additions,
            lines_removed: lines.deletions,
            total_line_changes: lines.additions + lines.deletions,
            words_added: words.additions,
            words_removed: words.deletions,
            total_word_changes: words.additions + words.deletions,
        }
    }
}

/// Summary of what changed between two consecutive uploads.
///
/// Serialises as
/// `{ previousVersion, newVersion, stats: { linesAdded, .. }, magnitude, changes }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDelta {
    pub previous_version: u32,
    pub new_version: u32,
    pub stats: DeltaStats,
    pub magnitude: ChangeMagnitude,
    /// First line-mode change runs, for a quick preview.
    pub changes: Vec<PreviewEntry>,
}

impl VersionDelta {
    pub fn new(
        previous_version: u32,
        new_version: u32,
        lines: ComparisonStats,
        words: ComparisonStats,
        changes: Vec<PreviewEntry>,
    ) -> Self {
        let stats = DeltaStats::new(lines, words);
        Self {
            previous_version,
            new_version,
            stats,
            magnitude: ChangeMagnitude::from_word_changes(stats.total_word_changes),
            changes,
        }
    }

    /// Delta between two versions with identical content.
    pub fn unchanged(previous_version: u32, new_version: u32) -> Self {
        Self::new(
            previous_version,
            new_version,
            ComparisonStats::default(),
            ComparisonStats::default(),
            Vec::new(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.stats.total_line_changes == 0 && self.stats.total_word_changes == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
