use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DvError, Result};

// ---------------------------------------------------------------------------
// TextSnapshot
// ---------------------------------------------------------------------------

/// One immutable, timestamped textual state of a document.
///
/// The JSON form uses camelCase keys (`versionNumber`, `createdAt`,
/// `changeSummary`). `content` may be absent or `null`; every consumer reads
/// it through [`TextSnapshot::content`], which yields `""` in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSnapshot {
    pub id: Uuid,
    /// 1-based version number within the owning document.
    pub version_number: u32,
    #[serde(default)]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub change_summary: Option<String>,
}

impl TextSnapshot {
    pub fn new(
        id: Uuid,
        version_number: u32,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            version_number,
            content: Some(content.into()),
            created_at,
            change_summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.change_summary = Some(summary.into());
        self
    }

    /// Markdown content, with missing content coerced to the empty string.
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Reject snapshots that cannot name a real version.
    pub fn validate(&self) -> Result<()> {
        if self.version_number == 0 {
            return Err(DvError::InvalidInput(format!(
                "snapshot {} has version number 0; version numbers start at 1",
                self.id
            )));
        }
        Ok(())
    }

    /// Chronological order: creation time, then version number, then id.
    ///
    /// Total and deterministic, so two snapshots sharing a timestamp still
    /// sort the same way regardless of argument order.
    pub fn chronological_cmp(&self, other: &TextSnapshot) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.version_number.cmp(&other.version_number))
            .then(self.id.cmp(&other.id))
    }

    pub fn header(&self) -> VersionHeader {
        VersionHeader {
            id: self.id,
            version_number: self.version_number,
            change_summary: self.change_summary.clone(),
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// VersionHeader
// ---------------------------------------------------------------------------

/// Content-free description of a snapshot as it appears in comparison output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHeader {
    pub id: Uuid,
    pub version_number: u32,
    pub change_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
