//! Unit-level diff using the Myers algorithm via the `similar` crate.
//!
//! Only units (lines or words) take part in matching. The whitespace between
//! them never counts as an edit: it is carried inside the run values so the
//! new document reads back exactly from its runs. Unchanged runs use the new
//! document's spacing, which means the old document reads back exactly in
//! line mode and token-for-token in word mode.
//!
//! Consecutive operations of the same kind are grouped into a single
//! [`ChangeRun`]. Within one changed region the removed text is emitted
//! before the added text.

use std::ops::Range;
use std::time::Instant;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use similar::{Algorithm, DiffOp};

use crate::tokenize::Segment;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Classification of a run, used for styling and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Unchanged,
}

/// Text carried by a run.
///
/// `value` is the exact text (separators included); `units` lists the lines
/// or words inside it, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunText {
    pub value: String,
    pub units: Vec<String>,
}

impl RunText {
    pub(crate) fn from_segments(segments: &[Segment<'_>]) -> Self {
        let value = segments.iter().map(|s| s.text).collect();
        let units = segments
            .iter()
            .filter(|s| s.is_unit())
            .map(|s| s.text.to_string())
            .collect();
        RunText { value, units }
    }
}

/// One maximal contiguous span of the diff output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRun {
    Added(RunText),
    Removed(RunText),
    Unchanged(RunText),
}

impl ChangeRun {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeRun::Added(_) => ChangeKind::Added,
            ChangeRun::Removed(_) => ChangeKind::Removed,
            ChangeRun::Unchanged(_) => ChangeKind::Unchanged,
        }
    }

    pub fn text(&self) -> &RunText {
        match self {
            ChangeRun::Added(t) | ChangeRun::Removed(t) | ChangeRun::Unchanged(t) => t,
        }
    }

    pub fn value(&self) -> &str {
        &self.text().value
    }

    pub fn units(&self) -> &[String] {
        &self.text().units
    }

    /// Number of lines or words in this run.
    pub fn count(&self) -> usize {
        self.text().units.len()
    }

    /// `true` for Added and Removed runs.
    pub fn is_change(&self) -> bool {
        !matches!(self, ChangeRun::Unchanged(_))
    }
}

/// Serialises as `{ "value", "added"?: true, "removed"?: true, "count" }`.
impl Serialize for ChangeRun {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let flag_fields = usize::from(self.is_change());
        let mut state = serializer.serialize_struct("ChangeRun", 2 + flag_fields)?;
        state.serialize_field("value", self.value())?;
        match self {
            ChangeRun::Added(_) => state.serialize_field("added", &true)?,
            ChangeRun::Removed(_) => state.serialize_field("removed", &true)?,
            ChangeRun::Unchanged(_) => {}
        }
        state.serialize_field("count", &self.count())?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the change runs turning `old` into `new`.
///
/// Units compare by exact text. When `deadline` passes, the Myers search
/// stops early and the remaining region is reported as a coarser
/// removal+addition; the result is still a valid edit script.
pub fn diff(old: &[Segment<'_>], new: &[Segment<'_>], deadline: Option<Instant>) -> Vec<ChangeRun> {
    let old = Layout::from_segments(old);
    let new = Layout::from_segments(new);

    let ops = similar::capture_diff_slices_deadline(Algorithm::Myers, &old.units, &new.units, deadline);

    build_runs(&collect_spans(&ops), &old, &new)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Units of one document plus the gaps around them.
///
/// `gaps[i]` is the whitespace before `units[i]`; the last gap trails the
/// final unit. In line mode the outer gaps are empty and the inner ones are
/// `\n`. A text with no units keeps its whitespace in `gaps[0]`.
struct Layout<'a> {
    units: Vec<&'a str>,
    gaps: Vec<&'a str>,
}

impl<'a> Layout<'a> {
    fn from_segments(segments: &[Segment<'a>]) -> Self {
        let mut units = Vec::new();
        let mut gaps = vec![""];
        for seg in segments {
            if seg.is_unit() {
                units.push(seg.text);
                gaps.push("");
            } else if let Some(gap) = gaps.last_mut() {
                *gap = seg.text;
            }
        }
        Layout { units, gaps }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanTag {
    Equal,
    Change,
}

#[derive(Debug, Clone)]
struct Span {
    tag: SpanTag,
    old: Range<usize>,
    new: Range<usize>,
}

impl Span {
    fn absorb(&mut self, next: &Span) {
        self.old.end = next.old.end;
        self.new.end = next.new.end;
    }
}

/// Turn raw diff ops into alternating Equal / Change spans.
fn collect_spans(ops: &[DiffOp]) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();

    for op in ops {
        let (tag, old, new) = match *op {
            DiffOp::Equal { old_index, new_index, len } => (
                SpanTag::Equal,
                old_index..old_index + len,
                new_index..new_index + len,
            ),
            DiffOp::Delete { old_index, old_len, new_index } => (
                SpanTag::Change,
                old_index..old_index + old_len,
                new_index..new_index,
            ),
            DiffOp::Insert { old_index, new_index, new_len } => (
                SpanTag::Change,
                old_index..old_index,
                new_index..new_index + new_len,
            ),
            DiffOp::Replace { old_index, old_len, new_index, new_len } => (
                SpanTag::Change,
                old_index..old_index + old_len,
                new_index..new_index + new_len,
            ),
        };
        push_span(&mut spans, Span { tag, old, new });
    }

    spans
}

fn push_span(spans: &mut Vec<Span>, span: Span) {
    if span.old.is_empty() && span.new.is_empty() {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if last.tag == span.tag {
            last.absorb(&span);
            return;
        }
    }
    spans.push(span);
}

/// Accumulates runs, merging consecutive pieces of the same kind.
#[derive(Default)]
struct RunBuilder {
    runs: Vec<(ChangeKind, RunText)>,
}

impl RunBuilder {
    fn current(&mut self, kind: ChangeKind) -> &mut RunText {
        let fresh = !matches!(self.runs.last(), Some((k, _)) if *k == kind);
        if fresh {
            self.runs.push((kind, RunText { value: String::new(), units: Vec::new() }));
        }
        let last = self.runs.len() - 1;
        &mut self.runs[last].1
    }

    fn text(&mut self, kind: ChangeKind, text: &str) {
        if !text.is_empty() {
            self.current(kind).value.push_str(text);
        }
    }

    fn unit(&mut self, kind: ChangeKind, unit: &str) {
        let run = self.current(kind);
        run.value.push_str(unit);
        run.units.push(unit.to_string());
    }

    /// Units `range` of `side` with the gaps between them.
    fn body(&mut self, kind: ChangeKind, side: &Layout<'_>, range: Range<usize>) {
        let first = range.start;
        for i in range {
            if i > first {
                self.text(kind, side.gaps[i]);
            }
            self.unit(kind, side.units[i]);
        }
    }

    fn finish(self) -> Vec<ChangeRun> {
        self.runs
            .into_iter()
            .map(|(kind, text)| match kind {
                ChangeKind::Added => ChangeRun::Added(text),
                ChangeKind::Removed => ChangeRun::Removed(text),
                ChangeKind::Unchanged => ChangeRun::Unchanged(text),
            })
            .collect()
    }
}

/// Gaps bordering one side of a change region.
///
/// A side with units has a leading and a trailing gap. A side with none
/// has a single gap where the other side's units were inserted or removed;
/// `lead` holds it and `trail` is `None`.
struct Edges<'a> {
    lead: &'a str,
    trail: Option<&'a str>,
}

impl<'a> Edges<'a> {
    fn of(side: &Layout<'a>, range: &Range<usize>) -> Self {
        if range.is_empty() {
            Edges { lead: side.gaps[range.start], trail: None }
        } else {
            Edges { lead: side.gaps[range.start], trail: Some(side.gaps[range.end]) }
        }
    }
}

fn build_runs(spans: &[Span], old: &Layout<'_>, new: &Layout<'_>) -> Vec<ChangeRun> {
    use ChangeKind::{Added, Removed, Unchanged};

    let mut out = RunBuilder::default();
    if spans.is_empty() {
        out.text(Unchanged, new.gaps[0]);
        return out.finish();
    }

    // Gap owed to the start of the next Unchanged run.
    let mut carry = "";
    let last = spans.len() - 1;

    for (i, span) in spans.iter().enumerate() {
        if span.tag == SpanTag::Equal {
            if i == 0 {
                out.text(Unchanged, new.gaps[0]);
            }
            out.text(Unchanged, std::mem::take(&mut carry));
            out.body(Unchanged, new, span.new.clone());
            if i == last {
                out.text(Unchanged, new.gaps[span.new.end]);
            }
            continue;
        }

        let before = i > 0;
        let after = i < last;
        let mut o = Edges::of(old, &span.old);
        let mut n = Edges::of(new, &span.new);

        match (o.trail, n.trail) {
            // Both sides keep units: shared edge gaps move into the
            // neighbouring Unchanged runs.
            (Some(o_trail), Some(n_trail)) => {
                if before && o.lead == n.lead {
                    out.text(Unchanged, n.lead);
                    o.lead = "";
                    n.lead = "";
                }
                if after && o_trail == n_trail {
                    carry = n_trail;
                    o.trail = Some("");
                    n.trail = Some("");
                }
            }
            // Pure insertion: the old gap must stay outside the Added run.
            (None, Some(n_trail)) => {
                let gap = o.lead;
                if before && gap == n.lead {
                    out.text(Unchanged, n.lead);
                    n.lead = "";
                } else if after && gap == n_trail {
                    carry = n_trail;
                    n.trail = Some("");
                } else if !gap.is_empty() && after {
                    carry = n_trail;
                    n.trail = Some("");
                } else if !gap.is_empty() && before {
                    out.text(Unchanged, n.lead);
                    n.lead = "";
                }
            }
            // Pure deletion: the new gap must stay outside the Removed run.
            (Some(o_trail), None) => {
                let gap = n.lead;
                if before && gap == o.lead {
                    out.text(Unchanged, gap);
                    o.lead = "";
                } else if after && gap == o_trail {
                    carry = gap;
                    o.trail = Some("");
                } else if after {
                    carry = gap;
                    if !gap.is_empty() {
                        o.trail = Some("");
                    }
                } else if before {
                    out.text(Unchanged, gap);
                    if !gap.is_empty() {
                        o.lead = "";
                    }
                } else {
                    carry = gap;
                }
            }
            (None, None) => {}
        }

        if !span.old.is_empty() {
            out.text(Removed, o.lead);
            out.body(Removed, old, span.old.clone());
            out.text(Removed, o.trail.unwrap_or_default());
        }
        if !span.new.is_empty() {
            out.text(Added, n.lead);
            out.body(Added, new, span.new.clone());
            out.text(Added, n.trail.unwrap_or_default());
        }
    }

    out.text(Unchanged, carry);
    out.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::{segment, tokenize, Granularity};
    use pretty_assertions::assert_eq;

    fn rebuild(runs: &[ChangeRun]) -> (String, String) {
        let old = runs.iter().filter(|r| r.kind() != ChangeKind::Added).map(ChangeRun::value).collect();
        let new = runs.iter().filter(|r| r.kind() != ChangeKind::Removed).map(ChangeRun::value).collect();
        (old, new)
    }

    fn run_diff(old: &str, new: &str, g: Granularity) -> Vec<ChangeRun> {
        diff(&segment(old, g), &segment(new, g), None)
    }

    fn shape(runs: &[ChangeRun]) -> Vec<(ChangeKind, &str, usize)> {
        runs.iter().map(|r| (r.kind(), r.value(), r.count())).collect()
    }

    #[test]
    fn appended_line_is_one_added_run() {
        let runs = run_diff("line1\nline2", "line1\nline2\nline3", Granularity::Lines);
        assert_eq!(
            shape(&runs),
            vec![
                (ChangeKind::Unchanged, "line1\nline2", 2),
                (ChangeKind::Added, "\nline3", 1),
            ]
        );
    }

    #[test]
    fn replaced_word_keeps_surrounding_whitespace_unchanged() {
        let runs = run_diff("The cat sat", "The dog sat", Granularity::Words);
        assert_eq!(
            shape(&runs),
            vec![
                (ChangeKind::Unchanged, "The ", 1),
                (ChangeKind::Removed, "cat", 1),
                (ChangeKind::Added, "dog", 1),
                (ChangeKind::Unchanged, " sat", 1),
            ]
        );
    }

    #[test]
    fn empty_old_is_single_added_run() {
        let runs = run_diff("", "new content", Granularity::Words);
        assert_eq!(shape(&runs), vec![(ChangeKind::Added, "new content", 2)]);
    }

    #[test]
    fn empty_new_is_single_removed_run() {
        let runs = run_diff("gone\nnow", "", Granularity::Lines);
        assert_eq!(shape(&runs), vec![(ChangeKind::Removed, "gone\nnow", 2)]);
    }

    #[test]
    fn both_empty_is_empty() {
        assert!(run_diff("", "", Granularity::Lines).is_empty());
        assert!(run_diff("", "", Granularity::Words).is_empty());
    }

    #[test]
    fn identical_is_single_unchanged_run() {
        let text = "# Title\n\nSome body text.\n";
        let runs = run_diff(text, text, Granularity::Lines);
        assert_eq!(shape(&runs), vec![(ChangeKind::Unchanged, text, 4)]);
    }

    #[test]
    fn adjacent_replaced_lines_form_one_change() {
        let runs = run_diff("a\nb", "c\nd", Granularity::Lines);
        assert_eq!(
            shape(&runs),
            vec![(ChangeKind::Removed, "a\nb", 2), (ChangeKind::Added, "c\nd", 2)]
        );
    }

    #[test]
    fn scattered_lines_keep_the_common_line() {
        let runs = run_diff("a\nb\nc\nd", "d\ne\nf\na", Granularity::Lines);
        let removed: usize = runs.iter().filter(|r| r.kind() == ChangeKind::Removed).map(ChangeRun::count).sum();
        let added: usize = runs.iter().filter(|r| r.kind() == ChangeKind::Added).map(ChangeRun::count).sum();
        assert_eq!((removed, added), (3, 3));
        assert_eq!(runs.iter().filter(|r| r.kind() == ChangeKind::Unchanged).count(), 1);
    }

    #[test]
    fn moved_word_costs_only_the_words_around_it() {
        let runs = run_diff("one two three KEEP", "KEEP four five six", Granularity::Words);
        let changed: usize = runs.iter().filter(|r| r.is_change()).map(ChangeRun::count).sum();
        assert_eq!(changed, 6);
    }

    #[test]
    fn blank_line_between_changes_stays_unchanged() {
        let runs = run_diff("a\n\nb", "c\n\nd", Granularity::Lines);
        let kinds: Vec<ChangeKind> = runs.iter().map(ChangeRun::kind).collect();
        assert!(kinds.contains(&ChangeKind::Unchanged), "blank line should stay: {runs:?}");
    }

    #[test]
    fn removed_precedes_added_in_a_change() {
        let runs = run_diff("one two three", "one 2 three", Granularity::Words);
        let removed = runs.iter().position(|r| r.kind() == ChangeKind::Removed).unwrap();
        let added = runs.iter().position(|r| r.kind() == ChangeKind::Added).unwrap();
        assert!(removed < added);
    }

    #[test]
    fn whitespace_only_difference_is_unchanged() {
        let runs = run_diff("The  cat\tsat ", "The cat sat", Granularity::Words);
        assert_eq!(shape(&runs), vec![(ChangeKind::Unchanged, "The cat sat", 3)]);
    }

    #[test]
    fn whitespace_only_texts_have_no_changes() {
        let runs = run_diff("   ", "\t", Granularity::Words);
        assert_eq!(shape(&runs), vec![(ChangeKind::Unchanged, "\t", 0)]);
        assert!(run_diff("  ", "", Granularity::Words).is_empty());
    }

    #[test]
    fn inserted_line_takes_its_own_newline() {
        let runs = run_diff("a\nb", "a\nx\nb", Granularity::Lines);
        assert_eq!(
            shape(&runs),
            vec![
                (ChangeKind::Unchanged, "a\n", 1),
                (ChangeKind::Added, "x\n", 1),
                (ChangeKind::Unchanged, "b", 1),
            ]
        );
    }

    #[test]
    fn inserted_word_with_different_spacing_keeps_tokens_apart() {
        let runs = run_diff("a b", "a\tX\tb", Granularity::Words);
        let (old, new) = rebuild(&runs);
        assert_eq!(new, "a\tX\tb");
        assert_eq!(tokenize(&old, Granularity::Words), vec!["a", "b"]);
        assert_eq!(runs.iter().filter(|r| r.is_change()).count(), 1);
    }

    #[test]
    fn units_are_recorded_per_run() {
        let runs = run_diff("a\nb\n", "a\nx\ny\n", Granularity::Lines);
        let added: Vec<&str> = runs
            .iter()
            .filter(|r| r.kind() == ChangeKind::Added)
            .flat_map(|r| r.units().iter().map(String::as_str))
            .collect();
        assert_eq!(added, vec!["x", "y"]);
    }

    #[test]
    fn runs_rebuild_both_sides() {
        let old = "# Plan\n\n- milk\n- eggs\n";
        let new = "# Plan\n\n- milk\n- bread\n- eggs\n\nDone.";
        for g in [Granularity::Lines, Granularity::Words] {
            let (rebuilt_old, rebuilt_new) = rebuild(&run_diff(old, new, g));
            assert_eq!(rebuilt_new, new);
            assert_eq!(tokenize(&rebuilt_old, g), tokenize(old, g));
        }
        let (rebuilt_old, _) = rebuild(&run_diff(old, new, Granularity::Lines));
        assert_eq!(rebuilt_old, old);
    }

    #[test]
    fn edits_at_either_end_rebuild_exactly_in_line_mode() {
        for (old, new) in [("b", "a\nb"), ("a\nb", "b"), ("a\nb", "a"), ("a", "a\nb"), ("x\n", "\ny")] {
            let (rebuilt_old, rebuilt_new) = rebuild(&run_diff(old, new, Granularity::Lines));
            assert_eq!((rebuilt_old.as_str(), rebuilt_new.as_str()), (old, new));
        }
    }

    #[test]
    fn expired_deadline_still_produces_valid_script() {
        let old: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let new: String = (0..200).map(|i| format!("line {}\n", i * 7 % 200)).collect();
        let runs = diff(
            &segment(&old, Granularity::Lines),
            &segment(&new, Granularity::Lines),
            Some(Instant::now()),
        );
        assert_eq!(rebuild(&runs).1, new);
    }

    #[test]
    fn serializes_with_flags_only_for_changes() {
        let runs = run_diff("The cat", "The dog", Granularity::Words);
        let json = serde_json::to_value(&runs).expect("serialize");
        assert_eq!(json[0], serde_json::json!({"value": "The ", "count": 1}));
        assert_eq!(json[1], serde_json::json!({"value": "cat", "removed": true, "count": 1}));
        assert_eq!(json[2], serde_json::json!({"value": "dog", "added": true, "count": 1}));
    }
}
