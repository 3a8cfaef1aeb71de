//! Line and word segmentation for markdown text.
//!
//! Two views of the same text are offered:
//!
//! - [`tokenize`] returns only the comparable **units** (lines or words).
//! - [`segment`] returns units interleaved with the **separators** between
//!   them (`\n` in line mode, whitespace runs in word mode), so that
//!   concatenating every segment reproduces the input byte-for-byte.
//!
//! The diff matches units only; separators ride along in the run values.
//!
//! Example (words):
//!   "The  cat" → [The][  ][cat]

use serde::{Deserialize, Serialize};

use dv_core::{DvError, Result};

// ---------------------------------------------------------------------------
// Granularity
// ---------------------------------------------------------------------------

/// Unit of comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Lines,
    Words,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Lines => "lines",
            Granularity::Words => "words",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "lines" => Ok(Granularity::Lines),
            "words" => Ok(Granularity::Words),
            other => Err(DvError::InvalidInput(format!(
                "unknown diff granularity: {other:?} (expected \"lines\" or \"words\")"
            ))),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A line (without its `\n`) or a word.
    Unit,
    /// The `\n` between two lines, or a whitespace run between words.
    Separator,
}

/// A borrowed slice of the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub kind: SegmentKind,
}

impl<'a> Segment<'a> {
    fn unit(text: &'a str) -> Self {
        Segment { text, kind: SegmentKind::Unit }
    }

    fn separator(text: &'a str) -> Self {
        Segment { text, kind: SegmentKind::Separator }
    }

    pub fn is_unit(&self) -> bool {
        self.kind == SegmentKind::Unit
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split `text` into comparable units.
///
/// - Lines: split on `\n`; a terminal newline leaves a trailing empty line.
/// - Words: maximal runs of non-whitespace; empty tokens never appear.
///
/// Empty text has no units in either mode.
pub fn tokenize(text: &str, granularity: Granularity) -> Vec<String> {
    segment(text, granularity)
        .into_iter()
        .filter(Segment::is_unit)
        .map(|s| s.text.to_string())
        .collect()
}

/// Split `text` into units and the separators between them, losslessly.
pub fn segment(text: &str, granularity: Granularity) -> Vec<Segment<'_>> {
    if text.is_empty() {
        return Vec::new();
    }
    match granularity {
        Granularity::Lines => segment_lines(text),
        Granularity::Words => segment_words(text),
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn segment_lines(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            segments.push(Segment::separator("\n"));
        }
        segments.push(Segment::unit(line));
    }
    segments
}

fn segment_words(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                segments.push(classify(&text[start..idx], prev));
                start = idx;
            }
            _ => {}
        }
        in_space = Some(space);
    }

    if let Some(space) = in_space {
        segments.push(classify(&text[start..], space));
    }
    segments
}

fn classify(text: &str, is_space: bool) -> Segment<'_> {
    if is_space {
        Segment::separator(text)
    } else {
        Segment::unit(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(segments: &[Segment<'a>]) -> Vec<&'a str> {
        segments.iter().map(|s| s.text).collect()
    }

    #[test]
    fn lines_split_on_newline() {
        assert_eq!(tokenize("line1\nline2", Granularity::Lines), vec!["line1", "line2"]);
    }

    #[test]
    fn terminal_newline_keeps_trailing_empty_line() {
        assert_eq!(tokenize("a\nb\n", Granularity::Lines), vec!["a", "b", ""]);
    }

    #[test]
    fn blank_lines_are_units() {
        assert_eq!(tokenize("# Title\n\nBody", Granularity::Lines), vec!["# Title", "", "Body"]);
    }

    #[test]
    fn carriage_return_stays_in_line() {
        assert_eq!(tokenize("a\r\nb", Granularity::Lines), vec!["a\r", "b"]);
    }

    #[test]
    fn words_split_on_whitespace_runs() {
        assert_eq!(
            tokenize("  The cat\t\tsat \n", Granularity::Words),
            vec!["The", "cat", "sat"]
        );
    }

    #[test]
    fn empty_text_has_no_units() {
        assert!(tokenize("", Granularity::Lines).is_empty());
        assert!(tokenize("", Granularity::Words).is_empty());
    }

    #[test]
    fn whitespace_only_has_no_words() {
        assert!(tokenize(" \t\n ", Granularity::Words).is_empty());
        assert_eq!(segment(" \t\n ", Granularity::Words).len(), 1);
    }

    #[test]
    fn line_segments_interleave_separators() {
        let segs = segment("a\n\nb", Granularity::Lines);
        assert_eq!(texts(&segs), vec!["a", "\n", "", "\n", "b"]);
        assert!(segs[0].is_unit());
        assert!(!segs[1].is_unit());
        assert!(segs[2].is_unit());
    }

    #[test]
    fn word_segments_keep_whitespace() {
        let segs = segment("The  cat", Granularity::Words);
        assert_eq!(texts(&segs), vec!["The", "  ", "cat"]);
        assert_eq!(segs[1].kind, SegmentKind::Separator);
    }

    #[test]
    fn segments_concatenate_to_input() {
        for text in ["", "x", "a\nb\n", "\n\n", " lead and trail ", "multi\u{00a0}byte é words"] {
            for g in [Granularity::Lines, Granularity::Words] {
                let joined: String = segment(text, g).iter().map(|s| s.text).collect();
                assert_eq!(joined, text, "granularity {g} lost bytes of {text:?}");
            }
        }
    }

    #[test]
    fn granularity_parses_known_values() {
        assert_eq!(Granularity::from_str("lines").unwrap(), Granularity::Lines);
        assert_eq!(Granularity::from_str("words").unwrap(), Granularity::Words);
    }

    #[test]
    fn granularity_rejects_unknown_values() {
        assert!(matches!(Granularity::from_str("chars"), Err(DvError::InvalidInput(_))));
        assert!(matches!(Granularity::from_str("Lines"), Err(DvError::InvalidInput(_))));
    }

    #[test]
    fn granularity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Granularity::Words).unwrap(), "\"words\"");
    }
}
