use std::os::raw::c_char;
use std::sync::OnceLock;

use serde::Serialize;

use dv_compare::{project, CompareConfig, ComparisonReport, Granularity, Projection, VersionComparator};
use dv_core::db::{create_pool, DbPool, SqliteVersionStore};
use dv_core::{Document, DocumentVersion, TextSnapshot};
use dv_history::{UploadRequest, VersionHistory};

use crate::logging;
use crate::marshal::{cstring_to_str, deserialize_json, optional_str, to_json, uuid_arg};
use crate::result::DvResult;

// ---------------------------------------------------------------------------
// Global version history
// ---------------------------------------------------------------------------

static HISTORY: OnceLock<VersionHistory<SqliteVersionStore>> = OnceLock::new();

fn history() -> Result<&'static VersionHistory<SqliteVersionStore>, String> {
    HISTORY
        .get()
        .ok_or_else(|| "Database not initialized. Call dv_init first.".to_string())
}

fn install(pool: DbPool) -> Result<(), String> {
    let history = VersionHistory::new(
        SqliteVersionStore::new(pool),
        VersionComparator::default(),
    );
    HISTORY
        .set(history)
        .map_err(|_| "Database already initialized; dv_init may only be called once.".to_string())
}

/// Serialize `outcome` into a heap-allocated envelope.
fn respond<T: Serialize>(outcome: Result<T, String>) -> *mut DvResult {
    match outcome.and_then(|value| to_json(&value)) {
        Ok(json) => DvResult::success(&json),
        Err(e) => {
            tracing::debug!(error = %e, "ffi call failed");
            DvResult::failure(&e)
        }
    }
}

#[derive(Serialize)]
struct RenderPayload {
    report: ComparisonReport,
    #[serde(flatten)]
    projection: Projection,
}

#[derive(Serialize)]
struct CreatedDocument {
    document: Document,
    version: DocumentVersion,
}

unsafe fn granularity_arg(ptr: *const c_char) -> Result<Granularity, String> {
    let s = cstring_to_str(ptr).map_err(|e| format!("granularity: {e}"))?;
    Granularity::from_str(s.trim()).map_err(|e| e.to_string())
}

unsafe fn snapshot_arg(ptr: *const c_char, what: &str) -> Result<TextSnapshot, String> {
    let json = cstring_to_str(ptr).map_err(|e| format!("{what}: {e}"))?;
    deserialize_json(&json, what)
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a `DvResult` returned by any `dv_*` function. Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by a `dv_*` function
/// that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn dv_free(ptr: *mut DvResult) {
    DvResult::free(ptr);
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

/// Open (or create) the version database at `db_path` and install logging.
///
/// Returns `data = "{}"` on success. Only the first call succeeds.
///
/// # Safety
///
/// `db_path` must be a valid, non-null, null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn dv_init(db_path: *const c_char) -> *mut DvResult {
    logging::init();
    respond((|| {
        let path = cstring_to_str(db_path)?;
        let pool = create_pool(&path).map_err(|e| e.to_string())?;
        install(pool)?;
        tracing::info!(path = %path, "version store initialised");
        Ok(serde_json::json!({}))
    })())
}

// ---------------------------------------------------------------------------
// Storage-free comparison
// ---------------------------------------------------------------------------

/// Compare two snapshot JSON objects.
///
/// `from_json`, `to_json`: `{ id, versionNumber, content, createdAt, changeSummary? }`.
/// `granularity`: `"lines"` or `"words"`.
/// `options_json`: compare options object; null or `""` for defaults.
///
/// `data` holds the comparison report JSON on success.
///
/// # Safety
///
/// `from_json`, `to_json` and `granularity` must be valid, non-null,
/// null-terminated C strings; `options_json` may be null.
#[no_mangle]
pub unsafe extern "C" fn dv_compare_snapshots(
    from_json: *const c_char,
    to_json: *const c_char,
    granularity: *const c_char,
    options_json: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let granularity = granularity_arg(granularity)?;
        let from = snapshot_arg(from_json, "from snapshot")?;
        let to = snapshot_arg(to_json, "to snapshot")?;
        let options = optional_str(options_json)?.unwrap_or_default();
        let config = CompareConfig::from_json(&options).map_err(|e| e.to_string())?;

        VersionComparator::new(config)
            .compare(&from, &to, granularity)
            .map_err(|e| e.to_string())
    })())
}

/// Compare two snapshots and project the result for display.
///
/// `data` is `{ report, rows }` for `"lines"` or `{ report, spans }` for
/// `"words"`.
///
/// # Safety
///
/// All arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn dv_render(
    from_json: *const c_char,
    to_json: *const c_char,
    granularity: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let granularity = granularity_arg(granularity)?;
        let from = snapshot_arg(from_json, "from snapshot")?;
        let to = snapshot_arg(to_json, "to snapshot")?;

        let report = VersionComparator::default()
            .compare(&from, &to, granularity)
            .map_err(|e| e.to_string())?;
        let projection = project(&report.runs, granularity);
        Ok(RenderPayload { report, projection })
    })())
}

// ---------------------------------------------------------------------------
// Stored versions
// ---------------------------------------------------------------------------

/// Compare two stored versions of a document, older first.
///
/// # Safety
///
/// All arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn dv_compare_versions(
    document_id: *const c_char,
    from_id: *const c_char,
    to_id: *const c_char,
    granularity: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let document_id = uuid_arg(document_id, "document")?;
        let from_id = uuid_arg(from_id, "from version")?;
        let to_id = uuid_arg(to_id, "to version")?;
        let granularity = granularity_arg(granularity)?;

        history()?
            .compare_versions(&document_id, &from_id, &to_id, granularity)
            .map_err(|e| e.to_string())
    })())
}

/// Compare the production version of a document with `version_id`.
///
/// # Safety
///
/// All arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn dv_compare_with_production(
    document_id: *const c_char,
    version_id: *const c_char,
    granularity: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let document_id = uuid_arg(document_id, "document")?;
        let version_id = uuid_arg(version_id, "version")?;
        let granularity = granularity_arg(granularity)?;

        history()?
            .compare_with_production(&document_id, &version_id, granularity)
            .map_err(|e| e.to_string())
    })())
}

/// Create a document with an optional initial markdown body as version 1.
///
/// `data` is `{ document, version }`.
///
/// # Safety
///
/// `title` and `author_id` must be valid, non-null, null-terminated C
/// strings; `markdown` may be null.
#[no_mangle]
pub unsafe extern "C" fn dv_create_document(
    title: *const c_char,
    markdown: *const c_char,
    author_id: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let title = cstring_to_str(title)?;
        let markdown = optional_str(markdown)?;
        let author_id = cstring_to_str(author_id)?;

        let (document, version) = history()?
            .create_document(&title, markdown.as_deref(), &author_id)
            .map_err(|e| e.to_string())?;
        Ok(CreatedDocument { document, version })
    })())
}

/// Store `markdown` as the next version of a document.
///
/// `request_json`: `{ "author_id": "...", "change_summary"?: "..." }`.
///
/// `data` is `{ version, previous_version_number, comparison }`.
///
/// # Safety
///
/// All arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn dv_upload_version(
    document_id: *const c_char,
    markdown: *const c_char,
    request_json: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let document_id = uuid_arg(document_id, "document")?;
        let markdown = cstring_to_str(markdown)?;
        let request: UploadRequest = deserialize_json(&cstring_to_str(request_json)?, "upload request")?;

        history()?
            .upload_version(&document_id, &markdown, &request)
            .map_err(|e| e.to_string())
    })())
}

/// Restore the content of `version_id` as a new version.
///
/// # Safety
///
/// All arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn dv_rollback(
    document_id: *const c_char,
    version_id: *const c_char,
    author_id: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let document_id = uuid_arg(document_id, "document")?;
        let version_id = uuid_arg(version_id, "version")?;
        let author_id = cstring_to_str(author_id)?;

        history()?
            .rollback(&document_id, &version_id, &author_id)
            .map_err(|e| e.to_string())
    })())
}

/// Promote a version to production.
///
/// # Safety
///
/// All arguments must be valid, non-null, null-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn dv_promote(
    document_id: *const c_char,
    version_id: *const c_char,
) -> *mut DvResult {
    respond((|| {
        let document_id = uuid_arg(document_id, "document")?;
        let version_id = uuid_arg(version_id, "version")?;

        history()?
            .promote(&document_id, &version_id)
            .map_err(|e| e.to_string())
    })())
}

/// All versions of a document, newest first.
///
/// # Safety
///
/// `document_id` must be a valid, non-null, null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn dv_history(document_id: *const c_char) -> *mut DvResult {
    respond((|| {
        let document_id = uuid_arg(document_id, "document")?;
        history()?.history(&document_id).map_err(|e| e.to_string())
    })())
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Like `dv_init`, but backed by an in-memory database.
#[cfg(test)]
pub fn dv_init_memory() -> *mut DvResult {
    use dv_core::db::create_memory_pool;
    respond((|| {
        let pool = create_memory_pool().map_err(|e| e.to_string())?;
        install(pool)?;
        Ok(serde_json::json!({}))
    })())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use uuid::Uuid;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn to_cstr(s: &str) -> CString {
        CString::new(s).expect("CString::new")
    }

    /// Read and free an envelope.
    fn take(ptr: *mut DvResult) -> Result<Value, String> {
        unsafe {
            assert!(!ptr.is_null());
            let outcome = if (*ptr).ok {
                let json = CStr::from_ptr((*ptr).data).to_str().expect("utf-8");
                Ok(serde_json::from_str(json).expect("json payload"))
            } else {
                Err(CStr::from_ptr((*ptr).error).to_str().expect("utf-8").to_string())
            };
            dv_free(ptr);
            outcome
        }
    }

    // DB state is a process-global OnceLock shared by every test in this
    // binary; the first caller initialises it and the rest reuse it.
    fn ensure_db() {
        let _ = take(dv_init_memory());
    }

    fn snapshot_json(n: u32, content: &str, secs: i64) -> CString {
        let snap = TextSnapshot::new(
            Uuid::new_v4(),
            n,
            content,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        );
        to_cstr(&serde_json::to_string(&snap).unwrap())
    }

    fn create_document(title: &str, markdown: &str) -> Value {
        let title = to_cstr(title);
        let markdown = to_cstr(markdown);
        let author = to_cstr("author-1");
        take(unsafe { dv_create_document(title.as_ptr(), markdown.as_ptr(), author.as_ptr()) })
            .expect("create document")
    }

    fn upload(document_id: &str, markdown: &str) -> Value {
        let id = to_cstr(document_id);
        let markdown = to_cstr(markdown);
        let request = to_cstr(r#"{"author_id": "author-1"}"#);
        take(unsafe { dv_upload_version(id.as_ptr(), markdown.as_ptr(), request.as_ptr()) })
            .expect("upload")
    }

    fn id_of(value: &Value) -> String {
        value["id"].as_str().expect("id").to_string()
    }

    // -----------------------------------------------------------------------
    // Envelope
    // -----------------------------------------------------------------------

    #[test]
    fn free_null_is_noop() {
        unsafe {
            dv_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn second_init_fails() {
        ensure_db();
        let err = take(dv_init_memory()).unwrap_err();
        assert!(err.contains("already initialized"), "{err}");
    }

    // -----------------------------------------------------------------------
    // Storage-free comparison
    // -----------------------------------------------------------------------

    #[test]
    fn compare_snapshots_produces_host_contract() {
        let from = snapshot_json(1, "line1\nline2", 0);
        let to = snapshot_json(2, "line1\nline2\nline3", 60);
        let g = to_cstr("lines");
        let json = take(unsafe {
            dv_compare_snapshots(from.as_ptr(), to.as_ptr(), g.as_ptr(), std::ptr::null())
        })
        .unwrap();

        assert_eq!(json["diffType"], "lines");
        assert_eq!(json["fromVersion"]["version_number"], 1);
        assert_eq!(json["stats"]["additions"], 1);
        assert_eq!(json["stats"]["deletions"], 0);
        assert_eq!(json["stats"]["totalChanges"], 1);
        assert_eq!(json["changes"][1]["added"], true);
    }

    #[test]
    fn compare_snapshots_swaps_reversed_arguments() {
        let older = snapshot_json(1, "a", 0);
        let newer = snapshot_json(2, "b", 60);
        let g = to_cstr("words");
        let json = take(unsafe {
            dv_compare_snapshots(newer.as_ptr(), older.as_ptr(), g.as_ptr(), std::ptr::null())
        })
        .unwrap();
        assert_eq!(json["fromVersion"]["version_number"], 1);
        assert_eq!(json["toVersion"]["version_number"], 2);
    }

    #[test]
    fn compare_snapshots_rejects_bad_granularity() {
        let from = snapshot_json(1, "a", 0);
        let to = snapshot_json(2, "b", 60);
        let g = to_cstr("paragraphs");
        let err = take(unsafe {
            dv_compare_snapshots(from.as_ptr(), to.as_ptr(), g.as_ptr(), std::ptr::null())
        })
        .unwrap_err();
        assert!(err.contains("granularity"), "{err}");
    }

    #[test]
    fn compare_snapshots_honours_options() {
        let from = snapshot_json(1, "a b c", 0);
        let to = snapshot_json(2, "a b c d", 60);
        let g = to_cstr("words");
        let options = to_cstr(r#"{"max_units": 2}"#);
        let err = take(unsafe {
            dv_compare_snapshots(from.as_ptr(), to.as_ptr(), g.as_ptr(), options.as_ptr())
        })
        .unwrap_err();
        assert!(err.contains("input too large"), "{err}");

        let unknown = to_cstr(r#"{"fuzzy": true}"#);
        assert!(take(unsafe {
            dv_compare_snapshots(from.as_ptr(), to.as_ptr(), g.as_ptr(), unknown.as_ptr())
        })
        .is_err());
    }

    #[test]
    fn compare_snapshots_rejects_malformed_snapshot() {
        let from = to_cstr(r#"{"id": "nope"}"#);
        let to = snapshot_json(2, "b", 60);
        let g = to_cstr("lines");
        let err = take(unsafe {
            dv_compare_snapshots(from.as_ptr(), to.as_ptr(), g.as_ptr(), std::ptr::null())
        })
        .unwrap_err();
        assert!(err.starts_with("invalid from snapshot JSON"), "{err}");
    }

    #[test]
    fn render_lines_returns_rows() {
        let from = snapshot_json(1, "a\nb", 0);
        let to = snapshot_json(2, "a\nc", 60);
        let g = to_cstr("lines");
        let json = take(unsafe { dv_render(from.as_ptr(), to.as_ptr(), g.as_ptr()) }).unwrap();

        assert_eq!(json["report"]["diffType"], "lines");
        let rows = json["rows"].as_array().expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["marker"], "-");
        assert!(rows[1]["line_number"].is_null());
        assert_eq!(rows[2]["line_number"], 2);
        assert!(json.get("spans").is_none());
    }

    #[test]
    fn render_words_returns_spans() {
        let from = snapshot_json(1, "The cat sat", 0);
        let to = snapshot_json(2, "The dog sat", 60);
        let g = to_cstr("words");
        let json = take(unsafe { dv_render(from.as_ptr(), to.as_ptr(), g.as_ptr()) }).unwrap();

        let spans = json["spans"].as_array().expect("spans");
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[1]["kind"], "removed");
        assert_eq!(spans[2]["text"], "dog");
    }

    // -----------------------------------------------------------------------
    // Stored versions
    // -----------------------------------------------------------------------

    #[test]
    fn upload_compare_promote_and_history() {
        ensure_db();
        let created = create_document("Policy", "The cat sat");
        let doc_id = id_of(&created["document"]);
        let v1_id = id_of(&created["version"]);

        let uploaded = upload(&doc_id, "The dog sat");
        assert_eq!(uploaded["previous_version_number"], 1);
        assert_eq!(uploaded["comparison"]["previousVersion"], 1);
        assert_eq!(uploaded["comparison"]["newVersion"], 2);
        assert_eq!(uploaded["comparison"]["stats"]["wordsAdded"], 1);
        assert_eq!(uploaded["comparison"]["stats"]["totalWordChanges"], 2);
        assert_eq!(uploaded["comparison"]["magnitude"], "minor");
        assert_eq!(uploaded["comparison"]["changes"].as_array().map(Vec::len), Some(2));
        let v2_id = id_of(&uploaded["version"]);

        let doc = to_cstr(&doc_id);
        let v1 = to_cstr(&v1_id);
        let v2 = to_cstr(&v2_id);
        let words = to_cstr("words");

        let report = take(unsafe {
            dv_compare_versions(doc.as_ptr(), v2.as_ptr(), v1.as_ptr(), words.as_ptr())
        })
        .unwrap();
        assert_eq!(report["fromVersion"]["version_number"], 1);
        assert_eq!(report["stats"]["additions"], 1);

        let err = take(unsafe {
            dv_compare_with_production(doc.as_ptr(), v2.as_ptr(), words.as_ptr())
        })
        .unwrap_err();
        assert!(err.starts_with("not found"), "{err}");

        let promoted = take(unsafe { dv_promote(doc.as_ptr(), v1.as_ptr()) }).unwrap();
        assert_eq!(promoted["status"], "production");

        let report = take(unsafe {
            dv_compare_with_production(doc.as_ptr(), v2.as_ptr(), words.as_ptr())
        })
        .unwrap();
        assert_eq!(report["stats"]["totalChanges"], 2);

        let conflict = take(unsafe { dv_promote(doc.as_ptr(), v1.as_ptr()) }).unwrap_err();
        assert!(conflict.starts_with("conflict"), "{conflict}");

        let versions = take(unsafe { dv_history(doc.as_ptr()) }).unwrap();
        let numbers: Vec<u64> = versions
            .as_array()
            .expect("array")
            .iter()
            .map(|v| v["version_number"].as_u64().unwrap())
            .collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[test]
    fn rollback_restores_content() {
        ensure_db();
        let created = create_document("Notes", "first");
        let doc_id = id_of(&created["document"]);
        let v1_id = id_of(&created["version"]);
        upload(&doc_id, "second");

        let doc = to_cstr(&doc_id);
        let v1 = to_cstr(&v1_id);
        let author = to_cstr("author-2");
        let outcome = take(unsafe { dv_rollback(doc.as_ptr(), v1.as_ptr(), author.as_ptr()) }).unwrap();
        assert_eq!(outcome["version"]["version_number"], 3);
        assert_eq!(outcome["version"]["content_markdown"], "first");
        assert_eq!(outcome["rolled_back_from"]["version_number"], 1);
    }

    #[test]
    fn invalid_uuid_is_reported() {
        ensure_db();
        let bad = to_cstr("not-a-uuid");
        let err = take(unsafe { dv_history(bad.as_ptr()) }).unwrap_err();
        assert!(err.contains("invalid document UUID"), "{err}");
    }

    #[test]
    fn upload_rejects_malformed_request() {
        ensure_db();
        let created = create_document("Glossary", "x");
        let doc = to_cstr(&id_of(&created["document"]));
        let markdown = to_cstr("y");
        let request = to_cstr(r#"{"author": "typo"}"#);
        let err = take(unsafe { dv_upload_version(doc.as_ptr(), markdown.as_ptr(), request.as_ptr()) })
            .unwrap_err();
        assert!(err.starts_with("invalid upload request JSON"), "{err}");
    }
}
