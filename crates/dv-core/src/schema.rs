use crate::error::Result;

/// Monotonic version string for the store layout, bumped whenever the DDL
/// below changes shape.
pub const SCHEMA_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// DDL
// ---------------------------------------------------------------------------

/// Full DDL for every table and index in the version store.
///
/// All tables use `CREATE TABLE IF NOT EXISTS` so that `run_migrations` is
/// idempotent and safe to call on an already-initialised database.
pub const CREATE_TABLES: &str = "
-- -------------------------------------------------------------------------
-- documents
-- -------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS documents (
    id                      TEXT    NOT NULL PRIMARY KEY,
    title                   TEXT    NOT NULL,
    current_version_id      TEXT             REFERENCES document_versions(id) ON DELETE SET NULL,
    production_version_id   TEXT             REFERENCES document_versions(id) ON DELETE SET NULL,
    created_at              TEXT    NOT NULL,
    updated_at              TEXT    NOT NULL
);

-- -------------------------------------------------------------------------
-- document_versions
-- -------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS document_versions (
    id                  TEXT    NOT NULL PRIMARY KEY,
    document_id         TEXT    NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    version_number      INTEGER NOT NULL CHECK (version_number >= 1),
    content_markdown    TEXT,
    content_hash        TEXT    NOT NULL,
    change_summary      TEXT,
    author_id           TEXT    NOT NULL,
    status              TEXT    NOT NULL DEFAULT 'draft',
    created_at          TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_document_versions_document_id
    ON document_versions (document_id);

CREATE UNIQUE INDEX IF NOT EXISTS uq_document_versions_document_number
    ON document_versions (document_id, version_number);
";

// ---------------------------------------------------------------------------
// Migration runner
// ---------------------------------------------------------------------------

/// Initialise (or upgrade) the database schema.
///
/// This function is **idempotent**: it is safe to call on a database that has
/// already been initialised.
pub fn run_migrations(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    // SQLite does not enforce foreign keys by default; every connection must
    // opt in.
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute_batch(CREATE_TABLES)?;

    tracing::debug!(schema_version = SCHEMA_VERSION, "version store schema ready");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
