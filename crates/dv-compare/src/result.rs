//! Comparison report, the structured output of the Version Comparator.
//!
//! The JSON form is the host contract:
//!
//! ```json
//! {
//!   "fromVersion": { "id", "version_number", "change_summary", "created_at" },
//!   "toVersion":   { ... },
//!   "changes": [ { "value", "added"?: true, "removed"?: true, "count" } ],
//!   "stats": { "additions", "deletions", "totalChanges" },
//!   "diffType": "lines" | "words"
//! }
//! ```

use serde::{Serialize, Serializer};

use dv_core::{TextSnapshot, VersionHeader};

use crate::aggregate::ComparisonStats;
use crate::diff::{ChangeKind, ChangeRun};
use crate::tokenize::Granularity;

// ---------------------------------------------------------------------------
// ComparisonReport
// ---------------------------------------------------------------------------

/// Result of comparing two snapshots, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonReport {
    /// Chronologically earlier snapshot.
    pub from_snapshot: TextSnapshot,
    /// Chronologically later snapshot.
    pub to_snapshot: TextSnapshot,
    pub granularity: Granularity,
    pub runs: Vec<ChangeRun>,
    pub stats: ComparisonStats,
}

impl ComparisonReport {
    /// `true` when the two snapshots have the same content.
    pub fn is_unchanged(&self) -> bool {
        self.stats.total_changes == 0
    }

    /// Concatenation of every non-Added run: the older document. In word
    /// mode its spacing follows the newer document wherever the runs are
    /// unchanged.
    pub fn old_text(&self) -> String {
        self.collect_text(ChangeKind::Added)
    }

    /// Concatenation of every non-Removed run: the newer document.
    pub fn new_text(&self) -> String {
        self.collect_text(ChangeKind::Removed)
    }

    fn collect_text(&self, skip: ChangeKind) -> String {
        self.runs
            .iter()
            .filter(|run| run.kind() != skip)
            .map(ChangeRun::value)
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportWire<'a> {
    from_version: VersionHeader,
    to_version: VersionHeader,
    changes: &'a [ChangeRun],
    stats: ComparisonStats,
    diff_type: Granularity,
}

impl Serialize for ComparisonReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReportWire {
            from_version: self.from_snapshot.header(),
            to_version: self.to_snapshot.header(),
            changes: &self.runs,
            stats: self.stats,
            diff_type: self.granularity,
        }
        .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::diff::diff;
    use crate::tokenize::segment;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn make_report(old: &str, new: &str) -> ComparisonReport {
        let from = TextSnapshot::new(
            Uuid::new_v4(),
            1,
            old,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
        .with_summary("Version 1 uploaded");
        let to = TextSnapshot::new(
            Uuid::new_v4(),
            2,
            new,
            Utc.timestamp_opt(1_700_000_600, 0).unwrap(),
        );
        let runs = diff(
            &segment(old, Granularity::Lines),
            &segment(new, Granularity::Lines),
            None,
        );
        let stats = aggregate(&runs);
        ComparisonReport {
            from_snapshot: from,
            to_snapshot: to,
            granularity: Granularity::Lines,
            runs,
            stats,
        }
    }

    #[test]
    fn serializes_host_contract_shape() {
        let report = make_report("line1\nline2", "line1\nline2\nline3");
        let json = serde_json::to_value(&report).expect("serialize");

        assert_eq!(json["diffType"], "lines");
        assert_eq!(json["fromVersion"]["version_number"], 1);
        assert_eq!(json["fromVersion"]["change_summary"], "Version 1 uploaded");
        assert!(json["toVersion"]["change_summary"].is_null());
        assert_eq!(json["toVersion"]["version_number"], 2);
        assert_eq!(json["stats"]["totalChanges"], 1);
        assert_eq!(json["changes"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["changes"][1]["added"], true);
        assert!(json.get("fromSnapshot").is_none(), "content must not leak");
    }

    #[test]
    fn rebuilds_both_documents() {
        let report = make_report("a\nb\nc", "a\nc\nd");
        assert_eq!(report.old_text(), "a\nb\nc");
        assert_eq!(report.new_text(), "a\nc\nd");
        assert!(!report.is_unchanged());
    }

    #[test]
    fn identical_report_is_unchanged() {
        let report = make_report("same", "same");
        assert!(report.is_unchanged());
    }
}
