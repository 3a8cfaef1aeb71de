use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{DvError, Result};
use crate::schema::run_migrations;
use crate::version::{Document, DocumentVersion, VersionStatus};

// ---------------------------------------------------------------------------
// Pool type alias
// ---------------------------------------------------------------------------

pub type DbPool = Pool<SqliteConnectionManager>;

// ---------------------------------------------------------------------------
// Pool constructors
// ---------------------------------------------------------------------------

/// Open a connection pool backed by a file-based SQLite database.
pub fn create_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
            Ok(())
        });

    let pool = Pool::builder()
        .max_size(16)
        .build(manager)
        .map_err(|e| DvError::Internal(e.to_string()))?;

    let conn = pool.get().map_err(|e| DvError::Internal(e.to_string()))?;
    run_migrations(&conn)?;

    tracing::debug!(path = db_path, "opened version store");
    Ok(pool)
}

/// Open a connection pool backed by a single in-memory SQLite database.
///
/// Every `:memory:` connection is its own database, so the pool is capped at
/// one connection to keep all callers on the migrated schema.
pub fn create_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| DvError::Internal(e.to_string()))?;

    let conn = pool.get().map_err(|e| DvError::Internal(e.to_string()))?;
    run_migrations(&conn)?;

    Ok(pool)
}

// ---------------------------------------------------------------------------
// VersionStore trait
// ---------------------------------------------------------------------------

/// Persistence interface for documents and their versions.
pub trait VersionStore: Send + Sync {
    fn insert_document(&self, doc: &Document) -> Result<()>;
    fn get_document(&self, id: &Uuid) -> Result<Document>;
    fn insert_version(&self, version: &DocumentVersion) -> Result<()>;
    /// Fetch a version, requiring it to belong to `document_id`.
    fn get_version(&self, document_id: &Uuid, version_id: &Uuid) -> Result<DocumentVersion>;
    /// All versions of a document, highest version number first.
    fn list_versions(&self, document_id: &Uuid) -> Result<Vec<DocumentVersion>>;
    fn latest_version(&self, document_id: &Uuid) -> Result<Option<DocumentVersion>>;
    fn production_version(&self, document_id: &Uuid) -> Result<Option<DocumentVersion>>;
    fn set_current_version(&self, document_id: &Uuid, version_id: &Uuid) -> Result<()>;
    /// Insert a document and its first version, and make that version
    /// current. Nothing is written unless every step succeeds.
    fn create_document_with_version(&self, doc: &Document, version: &DocumentVersion) -> Result<()>;
    /// Insert `version` and make it the current version of its document, as
    /// one unit of work.
    fn append_version(&self, version: &DocumentVersion) -> Result<()>;
    /// Make `version_id` the production version, archiving the previous one.
    fn promote_version(&self, document_id: &Uuid, version_id: &Uuid) -> Result<DocumentVersion>;
}

// ---------------------------------------------------------------------------
// SqliteVersionStore
// ---------------------------------------------------------------------------

pub struct SqliteVersionStore {
    pool: DbPool,
}

impl SqliteVersionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| DvError::Internal(e.to_string()))
    }
}

const VERSION_COLUMNS: &str = "id, document_id, version_number, content_markdown, content_hash,
                               change_summary, author_id, status, created_at";

// ---------------------------------------------------------------------------
// Helpers: row conversion
// ---------------------------------------------------------------------------

fn conversion_error<E>(col: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_uuid(col: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion_error(col, e))
}

fn parse_timestamp(col: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>().map_err(|e| conversion_error(col, e))
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let current_str: Option<String> = row.get(2)?;
    let production_str: Option<String> = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    let updated_at_str: String = row.get(5)?;

    Ok(Document {
        id: parse_uuid(0, &id_str)?,
        title,
        current_version_id: current_str.map(|s| parse_uuid(2, &s)).transpose()?,
        production_version_id: production_str.map(|s| parse_uuid(3, &s)).transpose()?,
        created_at: parse_timestamp(4, &created_at_str)?,
        updated_at: parse_timestamp(5, &updated_at_str)?,
    })
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentVersion> {
    let id_str: String = row.get(0)?;
    let document_id_str: String = row.get(1)?;
    let version_number: i64 = row.get(2)?;
    let content_markdown: Option<String> = row.get(3)?;
    let content_hash: String = row.get(4)?;
    let change_summary: Option<String> = row.get(5)?;
    let author_id: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(8)?;

    let version_number = u32::try_from(version_number).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Integer, Box::new(e))
    })?;
    let status = VersionStatus::from_str(&status_str).map_err(|e| conversion_error(7, e))?;

    Ok(DocumentVersion {
        id: parse_uuid(0, &id_str)?,
        document_id: parse_uuid(1, &document_id_str)?,
        version_number,
        content_markdown,
        content_hash,
        change_summary,
        author_id,
        status,
        created_at: parse_timestamp(8, &created_at_str)?,
    })
}

// ---------------------------------------------------------------------------
// Helpers: writes shared by single statements and transactions
// ---------------------------------------------------------------------------

fn write_document(conn: &Connection, doc: &Document) -> Result<()> {
    conn.execute(
        "INSERT INTO documents
         (id, title, current_version_id, production_version_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            doc.id.to_string(),
            doc.title,
            doc.current_version_id.map(|u| u.to_string()),
            doc.production_version_id.map(|u| u.to_string()),
            doc.created_at.to_rfc3339(),
            doc.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn write_version(conn: &Connection, version: &DocumentVersion) -> Result<()> {
    conn.execute(
        "INSERT INTO document_versions
         (id, document_id, version_number, content_markdown, content_hash,
          change_summary, author_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            version.id.to_string(),
            version.document_id.to_string(),
            version.version_number as i64,
            version.content_markdown,
            version.content_hash,
            version.change_summary,
            version.author_id,
            version.status.as_str(),
            version.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn write_current_version(conn: &Connection, document_id: &Uuid, version_id: &Uuid) -> Result<()> {
    let affected = conn.execute(
        "UPDATE documents
            SET current_version_id = ?2,
                updated_at         = ?3
          WHERE id = ?1",
        params![
            document_id.to_string(),
            version_id.to_string(),
            Utc::now().to_rfc3339(),
        ],
    )?;

    if affected == 0 {
        return Err(DvError::NotFound(format!("document {document_id}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// VersionStore impl
// ---------------------------------------------------------------------------

impl VersionStore for SqliteVersionStore {
    fn insert_document(&self, doc: &Document) -> Result<()> {
        write_document(&*self.conn()?, doc)?;
        tracing::debug!(document_id = %doc.id, "inserted document");
        Ok(())
    }

    fn get_document(&self, id: &Uuid) -> Result<Document> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, title, current_version_id, production_version_id, created_at, updated_at
               FROM documents
              WHERE id = ?1",
            params![id.to_string()],
            row_to_document,
        )
        .optional()?
        .ok_or_else(|| DvError::NotFound(format!("document {id}")))
    }

    fn insert_version(&self, version: &DocumentVersion) -> Result<()> {
        write_version(&*self.conn()?, version)?;
        tracing::debug!(
            document_id = %version.document_id,
            version_number = version.version_number,
            "inserted version"
        );
        Ok(())
    }

    fn get_version(&self, document_id: &Uuid, version_id: &Uuid) -> Result<DocumentVersion> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {VERSION_COLUMNS}
                   FROM document_versions
                  WHERE id = ?1 AND document_id = ?2"
            ),
            params![version_id.to_string(), document_id.to_string()],
            row_to_version,
        )
        .optional()?
        .ok_or_else(|| {
            DvError::NotFound(format!("version {version_id} of document {document_id}"))
        })
    }

    fn list_versions(&self, document_id: &Uuid) -> Result<Vec<DocumentVersion>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS}
               FROM document_versions
              WHERE document_id = ?1
              ORDER BY version_number DESC"
        ))?;

        let versions = stmt
            .query_map(params![document_id.to_string()], row_to_version)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    fn latest_version(&self, document_id: &Uuid) -> Result<Option<DocumentVersion>> {
        let conn = self.conn()?;
        let version = conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS}
                       FROM document_versions
                      WHERE document_id = ?1
                      ORDER BY version_number DESC
                      LIMIT 1"
                ),
                params![document_id.to_string()],
                row_to_version,
            )
            .optional()?;
        Ok(version)
    }

    fn production_version(&self, document_id: &Uuid) -> Result<Option<DocumentVersion>> {
        let conn = self.conn()?;
        let version = conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS}
                       FROM document_versions
                      WHERE document_id = ?1 AND status = ?2
                      LIMIT 1"
                ),
                params![document_id.to_string(), VersionStatus::Production.as_str()],
                row_to_version,
            )
            .optional()?;
        Ok(version)
    }

    fn set_current_version(&self, document_id: &Uuid, version_id: &Uuid) -> Result<()> {
        write_current_version(&*self.conn()?, document_id, version_id)
    }

    fn create_document_with_version(&self, doc: &Document, version: &DocumentVersion) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_document(&tx, doc)?;
        write_version(&tx, version)?;
        write_current_version(&tx, &doc.id, &version.id)?;
        tx.commit()?;

        tracing::debug!(document_id = %doc.id, version_id = %version.id, "created document");
        Ok(())
    }

    fn append_version(&self, version: &DocumentVersion) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_version(&tx, version)?;
        write_current_version(&tx, &version.document_id, &version.id)?;
        tx.commit()?;

        tracing::debug!(
            document_id = %version.document_id,
            version_number = version.version_number,
            "appended version"
        );
        Ok(())
    }

    fn promote_version(&self, document_id: &Uuid, version_id: &Uuid) -> Result<DocumentVersion> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM document_versions WHERE id = ?1 AND document_id = ?2",
                params![version_id.to_string(), document_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(DvError::NotFound(format!(
                "version {version_id} of document {document_id}"
            )));
        }

        tx.execute(
            "UPDATE document_versions
                SET status = ?2
              WHERE document_id = ?1 AND status = ?3",
            params![
                document_id.to_string(),
                VersionStatus::Archived.as_str(),
                VersionStatus::Production.as_str(),
            ],
        )?;
        tx.execute(
            "UPDATE document_versions SET status = ?2 WHERE id = ?1",
            params![version_id.to_string(), VersionStatus::Production.as_str()],
        )?;
        tx.execute(
            "UPDATE documents
                SET production_version_id = ?2,
                    updated_at            = ?3
              WHERE id = ?1",
            params![
                document_id.to_string(),
                version_id.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        let promoted = tx.query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM document_versions WHERE id = ?1"),
            params![version_id.to_string()],
            row_to_version,
        )?;
        tx.commit()?;

        tracing::debug!(
            document_id = %document_id,
            version_number = promoted.version_number,
            "promoted version to production"
        );
        Ok(promoted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
