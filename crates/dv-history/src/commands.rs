//! Version lifecycle operations: upload, rollback, promotion, comparison and
//! history, composed from a [`VersionStore`] and a [`VersionComparator`].

use tracing::{info, warn};
use uuid::Uuid;

use dv_compare::{ComparisonReport, Granularity, VersionComparator, VersionDelta};
use dv_core::db::VersionStore;
use dv_core::{Document, DocumentVersion, DvError, Result, VersionStatus};

use crate::outcome::{RollbackOutcome, RolledBackFrom, UploadOutcome, UploadRequest};
use crate::validator::validate_transition;

pub struct VersionHistory<S: VersionStore> {
    store: S,
    comparator: VersionComparator,
}

impl<S: VersionStore> VersionHistory<S> {
    pub fn new(store: S, comparator: VersionComparator) -> Self {
        Self { store, comparator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn comparator(&self) -> &VersionComparator {
        &self.comparator
    }

    /// Create a document together with its first version, which becomes the
    /// current version.
    pub fn create_document(
        &self,
        title: &str,
        initial_markdown: Option<&str>,
        author_id: &str,
    ) -> Result<(Document, DocumentVersion)> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DvError::InvalidInput("document title must not be empty".to_string()));
        }
        require_author(author_id)?;

        let document = Document::new(title);
        let version = DocumentVersion::new(
            document.id,
            1,
            initial_markdown.map(str::to_string),
            Some(default_summary(1)),
            author_id,
        );
        self.store.create_document_with_version(&document, &version)?;

        info!(document_id = %document.id, version_id = %version.id, "created document");
        Ok((self.store.get_document(&document.id)?, version))
    }

    /// Store `markdown` as the next version and summarise what changed since
    /// the previous one.
    ///
    /// The comparison is best-effort: if it fails the upload still succeeds
    /// with `comparison: None`.
    pub fn upload_version(
        &self,
        document_id: &Uuid,
        markdown: &str,
        request: &UploadRequest,
    ) -> Result<UploadOutcome> {
        require_author(&request.author_id)?;
        self.store.get_document(document_id)?;

        let previous = self.store.latest_version(document_id)?;
        let next_number = previous.as_ref().map_or(1, |v| v.version_number + 1);

        let summary = request
            .change_summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(|| default_summary(next_number), str::to_string);

        let version = DocumentVersion::new(
            *document_id,
            next_number,
            Some(markdown.to_string()),
            Some(summary),
            &request.author_id,
        );
        self.store.append_version(&version)?;

        let comparison = previous.as_ref().and_then(|prev| {
            self.upload_delta(prev, &version)
                .map_err(|e| {
                    warn!(
                        document_id = %document_id,
                        version_number = next_number,
                        error = %e,
                        "comparison with previous version failed"
                    )
                })
                .ok()
        });

        info!(
            document_id = %document_id,
            version_number = next_number,
            magnitude = comparison.as_ref().map(|d| d.magnitude.as_str()),
            "uploaded version"
        );

        Ok(UploadOutcome {
            version,
            previous_version_number: previous.map_or(0, |v| v.version_number),
            comparison,
        })
    }

    /// Restore the content of `target_version_id` as a brand-new version.
    pub fn rollback(
        &self,
        document_id: &Uuid,
        target_version_id: &Uuid,
        author_id: &str,
    ) -> Result<RollbackOutcome> {
        require_author(author_id)?;
        let target = self.store.get_version(document_id, target_version_id)?;
        let latest = self.store.latest_version(document_id)?.ok_or_else(|| {
            DvError::Internal(format!("document {document_id} has no versions"))
        })?;

        let summary = match target.change_summary.as_deref() {
            Some(s) => format!("Rollback to v{}: {s}", target.version_number),
            None => format!("Rollback to v{}", target.version_number),
        };

        let version = DocumentVersion::new(
            *document_id,
            latest.version_number + 1,
            target.content_markdown.clone(),
            Some(summary),
            author_id,
        );
        self.store.append_version(&version)?;

        info!(
            document_id = %document_id,
            from = target.version_number,
            version_number = version.version_number,
            "rolled back"
        );

        Ok(RollbackOutcome {
            version,
            rolled_back_from: RolledBackFrom {
                version_number: target.version_number,
                change_summary: target.change_summary,
            },
        })
    }

    /// Publish a version, archiving whichever version was in production.
    pub fn promote(&self, document_id: &Uuid, version_id: &Uuid) -> Result<DocumentVersion> {
        let version = self.store.get_version(document_id, version_id)?;
        validate_transition(version.status, VersionStatus::Production)?;

        let promoted = self.store.promote_version(document_id, version_id)?;
        info!(
            document_id = %document_id,
            version_number = promoted.version_number,
            "promoted version to production"
        );
        Ok(promoted)
    }

    /// Compare two versions of the same document, older first.
    pub fn compare_versions(
        &self,
        document_id: &Uuid,
        from_id: &Uuid,
        to_id: &Uuid,
        granularity: Granularity,
    ) -> Result<ComparisonReport> {
        if from_id == to_id {
            return Err(DvError::InvalidInput(
                "cannot compare a version with itself".to_string(),
            ));
        }
        let from = self.store.get_version(document_id, from_id)?;
        let to = self.store.get_version(document_id, to_id)?;
        self.comparator
            .compare(&from.snapshot(), &to.snapshot(), granularity)
    }

    /// Compare the production version with `version_id`.
    pub fn compare_with_production(
        &self,
        document_id: &Uuid,
        version_id: &Uuid,
        granularity: Granularity,
    ) -> Result<ComparisonReport> {
        let production = self.store.production_version(document_id)?.ok_or_else(|| {
            DvError::NotFound(format!("production version of document {document_id}"))
        })?;
        if production.id == *version_id {
            return Err(DvError::InvalidInput(
                "version is the production version".to_string(),
            ));
        }
        let version = self.store.get_version(document_id, version_id)?;
        self.comparator
            .compare(&production.snapshot(), &version.snapshot(), granularity)
    }

    /// All versions of a document, newest first.
    pub fn history(&self, document_id: &Uuid) -> Result<Vec<DocumentVersion>> {
        self.store.get_document(document_id)?;
        self.store.list_versions(document_id)
    }

    fn upload_delta(&self, previous: &DocumentVersion, current: &DocumentVersion) -> Result<VersionDelta> {
        if previous.content_hash == current.content_hash {
            return Ok(VersionDelta::unchanged(
                previous.version_number,
                current.version_number,
            ));
        }
        self.comparator.delta(&previous.snapshot(), &current.snapshot())
    }
}

fn require_author(author_id: &str) -> Result<()> {
    if author_id.trim().is_empty() {
        return Err(DvError::InvalidInput("author_id must not be empty".to_string()));
    }
    Ok(())
}

fn default_summary(version_number: u32) -> String {
    format!("Version {version_number} uploaded")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
