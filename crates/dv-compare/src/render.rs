//! Render Projection: turns change runs into display-ready rows (line mode)
//! or spans (word mode) for a UI renderer.

use serde::Serialize;

use crate::diff::{ChangeKind, ChangeRun};
use crate::tokenize::Granularity;

// ---------------------------------------------------------------------------
// Display types
// ---------------------------------------------------------------------------

/// One line of a line-mode diff table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRow {
    /// 1-based line number in the newer document; `None` for removed lines.
    pub line_number: Option<usize>,
    /// 1-based line number in the older document; `None` for added lines.
    pub old_line_number: Option<usize>,
    pub kind: ChangeKind,
    /// `+`, `-`, or a space.
    pub marker: char,
    pub text: String,
}

/// One inline span of a word-mode diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordSpan {
    pub kind: ChangeKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    Rows(Vec<LineRow>),
    Spans(Vec<WordSpan>),
}

impl Projection {
    pub fn rows(&self) -> Option<&[LineRow]> {
        match self {
            Projection::Rows(rows) => Some(rows),
            Projection::Spans(_) => None,
        }
    }

    pub fn spans(&self) -> Option<&[WordSpan]> {
        match self {
            Projection::Spans(spans) => Some(spans),
            Projection::Rows(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project runs for display according to `granularity`.
pub fn project(runs: &[ChangeRun], granularity: Granularity) -> Projection {
    match granularity {
        Granularity::Lines => Projection::Rows(line_rows(runs)),
        Granularity::Words => Projection::Spans(word_spans(runs)),
    }
}

fn marker(kind: ChangeKind) -> char {
    match kind {
        ChangeKind::Added => '+',
        ChangeKind::Removed => '-',
        ChangeKind::Unchanged => ' ',
    }
}

fn line_rows(runs: &[ChangeRun]) -> Vec<LineRow> {
    let mut rows = Vec::new();
    let mut new_line = 0usize;
    let mut old_line = 0usize;

    for run in runs {
        let kind = run.kind();
        for unit in run.units() {
            let line_number = match kind {
                ChangeKind::Removed => None,
                _ => {
                    new_line += 1;
                    Some(new_line)
                }
            };
            let old_line_number = match kind {
                ChangeKind::Added => None,
                _ => {
                    old_line += 1;
                    Some(old_line)
                }
            };
            rows.push(LineRow {
                line_number,
                old_line_number,
                kind,
                marker: marker(kind),
                text: unit.clone(),
            });
        }
    }

    rows
}

fn word_spans(runs: &[ChangeRun]) -> Vec<WordSpan> {
    runs.iter()
        .map(|run| WordSpan {
            kind: run.kind(),
            text: run.value().to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
