use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DvError;
use crate::hash::compute_content_hash;
use crate::snapshot::TextSnapshot;

// ---------------------------------------------------------------------------
// VersionStatus
// ---------------------------------------------------------------------------

/// Publication state of a single document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Uploaded but not published.
    Draft,
    /// The official published version; at most one per document.
    Production,
    /// Formerly in production, superseded by a later promotion.
    Archived,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Production => "production",
            VersionStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, DvError> {
        match s {
            "draft" => Ok(VersionStatus::Draft),
            "production" => Ok(VersionStatus::Production),
            "archived" => Ok(VersionStatus::Archived),
            other => Err(DvError::InvalidInput(format!(
                "unknown version status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A versioned document: the parent of every [`DocumentVersion`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    /// Version most recently uploaded or rolled back to.
    pub current_version_id: Option<Uuid>,
    /// Version currently published, if any has been promoted.
    pub production_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(title: &str) -> Self {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            title: title.to_string(),
            current_version_id: None,
            production_version_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentVersion
// ---------------------------------------------------------------------------

/// A stored version row: markdown content plus authorship and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_number: u32,
    /// Converted markdown; `None` when conversion produced nothing storable.
    pub content_markdown: Option<String>,
    /// SHA-256 of `content_markdown` (missing content hashes as `""`).
    pub content_hash: String,
    pub change_summary: Option<String>,
    pub author_id: String,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
}

impl DocumentVersion {
    pub fn new(
        document_id: Uuid,
        version_number: u32,
        content_markdown: Option<String>,
        change_summary: Option<String>,
        author_id: &str,
    ) -> Self {
        let content_hash = compute_content_hash(content_markdown.as_deref());
        DocumentVersion {
            id: Uuid::new_v4(),
            document_id,
            version_number,
            content_markdown,
            content_hash,
            change_summary,
            author_id: author_id.to_string(),
            status: VersionStatus::Draft,
            created_at: Utc::now(),
        }
    }

    /// This version as comparator input.
    pub fn snapshot(&self) -> TextSnapshot {
        TextSnapshot {
            id: self.id,
            version_number: self.version_number,
            content: self.content_markdown.clone(),
            created_at: self.created_at,
            change_summary: self.change_summary.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
