use serde::{Deserialize, Serialize};

use dv_compare::VersionDelta;
use dv_core::DocumentVersion;

/// Metadata accompanying an uploaded version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadRequest {
    /// Free-text summary; blank means "Version N uploaded".
    #[serde(default)]
    pub change_summary: Option<String>,
    /// Required and must not be blank.
    pub author_id: String,
}

/// Result of [`crate::VersionHistory::upload_version`].
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub version: DocumentVersion,
    /// Version number the upload was compared against; 0 for a first upload.
    pub previous_version_number: u32,
    /// `None` for a first upload, or when the comparison could not be made.
    pub comparison: Option<VersionDelta>,
}

/// Result of [`crate::VersionHistory::rollback`].
#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutcome {
    /// The newly created version carrying the restored content.
    pub version: DocumentVersion,
    pub rolled_back_from: RolledBackFrom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolledBackFrom {
    pub version_number: u32,
    pub change_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_request_requires_author() {
        let parsed: UploadRequest =
            serde_json::from_str(r#"{"author_id": "u-1"}"#).expect("author only");
        assert_eq!(parsed.author_id, "u-1");
        assert!(parsed.change_summary.is_none());

        assert!(serde_json::from_str::<UploadRequest>("{}").is_err());
        assert!(serde_json::from_str::<UploadRequest>(r#"{"change_summary": "x"}"#).is_err());
    }
}
