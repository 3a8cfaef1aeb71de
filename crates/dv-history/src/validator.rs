use dv_core::{DvError, VersionStatus};

/// Validate moving a version from `current` to `next` and return `next`.
///
/// Promoting a version that is already in production is a `Conflict`; any
/// other illegal move is `InvalidInput`.
pub fn validate_transition(
    current: VersionStatus,
    next: VersionStatus,
) -> Result<VersionStatus, DvError> {
    match (current, next) {
        (VersionStatus::Draft, VersionStatus::Production)
        | (VersionStatus::Archived, VersionStatus::Production)
        | (VersionStatus::Production, VersionStatus::Archived) => Ok(next),

        (VersionStatus::Production, VersionStatus::Production) => Err(DvError::Conflict(
            "version is already in production".to_string(),
        )),

        (from, to) => Err(DvError::InvalidInput(format!(
            "illegal status transition: '{from}' -> '{to}'"
        ))),
    }
}

/// Statuses reachable from `status` in one step.
pub fn legal_transitions(status: VersionStatus) -> Vec<VersionStatus> {
    match status {
        VersionStatus::Draft => vec![VersionStatus::Production],
        VersionStatus::Production => vec![VersionStatus::Archived],
        VersionStatus::Archived => vec![VersionStatus::Production],
    }
}
