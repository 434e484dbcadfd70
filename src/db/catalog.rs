use crate::db::Db;
use crate::error::{DocdexError, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;

/// Failure messages stored on a document row are capped at this many chars.
const ERROR_MSG_MAX_CHARS: usize = 1000;

/// Processing status of a catalog document.
///
/// Transitions: `pending -> processing -> {indexed, failed}`. Rows are
/// created directly in `processing` since creation happens right before the
/// pipeline starts expensive work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Processing,
    Indexed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Indexed => "indexed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "indexed" => Ok(DocumentStatus::Indexed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(DocdexError::InvalidInput(format!(
                "Unknown document status: {}",
                other
            ))),
        }
    }
}

/// A durable catalog document row
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub doc_id: i64,
    pub folder_id: Option<i64>,
    pub file_name: String,
    pub path: String,
    pub file_type: String,
    pub content_hash: String,
    pub size_bytes: i64,
    pub dept_id: i64,
    pub role_id: i64,
    pub page_count: i64,
    pub status: DocumentStatus,
    pub error_msg: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a new document row
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub folder_id: Option<i64>,
    pub file_name: String,
    pub path: String,
    pub file_type: String,
    pub content_hash: String,
    pub size_bytes: i64,
    pub dept_id: i64,
    pub role_id: i64,
}

/// Result of attempting to create a `processing` row.
///
/// `DuplicateHash` is the uniqueness backstop: two pipeline runs raced past
/// the dedup check and the loser gets the winner's id instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(i64),
    DuplicateHash(i64),
}

const DOCUMENT_COLUMNS: &str = "doc_id, folder_id, file_name, path, file_type, content_hash, \
     size_bytes, dept_id, role_id, page_count, status, error_msg, created_at, updated_at";

fn map_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    let status_str: String = row.get(10)?;
    let status = DocumentStatus::parse(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(DocumentRecord {
        doc_id: row.get(0)?,
        folder_id: row.get(1)?,
        file_name: row.get(2)?,
        path: row.get(3)?,
        file_type: row.get(4)?,
        content_hash: row.get(5)?,
        size_bytes: row.get(6)?,
        dept_id: row.get(7)?,
        role_id: row.get(8)?,
        page_count: row.get(9)?,
        status,
        error_msg: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn is_unique_violation_on(err: &rusqlite::Error, column: &str) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(column)
    )
}

/// Truncate to a character count, never splitting a multi-byte char.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Look up a live document by its content fingerprint (the dedup key).
pub async fn find_by_hash(db: &Db, content_hash: &str) -> Result<Option<DocumentRecord>> {
    let hash = content_hash.to_string();
    db.with_connection(move |conn| {
        let sql = format!(
            "SELECT {} FROM documents WHERE content_hash = ?1",
            DOCUMENT_COLUMNS
        );
        let doc = conn
            .query_row(&sql, params![hash], map_document)
            .optional()?;
        Ok::<Option<DocumentRecord>, DocdexError>(doc)
    })
    .await
}

/// Fetch a document by id, or `DocumentNotFound`.
pub async fn get(db: &Db, doc_id: i64) -> Result<DocumentRecord> {
    let doc = db
        .with_connection(move |conn| {
            let sql = format!("SELECT {} FROM documents WHERE doc_id = ?1", DOCUMENT_COLUMNS);
            let doc = conn
                .query_row(&sql, params![doc_id], map_document)
                .optional()?;
            Ok::<Option<DocumentRecord>, DocdexError>(doc)
        })
        .await?;
    doc.ok_or_else(|| DocdexError::DocumentNotFound(format!("doc_id={}", doc_id)))
}

/// Create a document row in `processing` status.
///
/// Returns the new id before any expensive pipeline work runs, so a crash
/// mid-pipeline leaves a discoverable `processing`/`failed` row. A uniqueness
/// violation on content_hash resolves to the already-existing row's id.
pub async fn create_processing(db: &Db, new: NewDocument) -> Result<CreateOutcome> {
    db.with_connection(move |conn| {
        let now = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT INTO documents (
                folder_id, file_name, path, file_type, content_hash,
                size_bytes, dept_id, role_id, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'processing', ?9, ?9)",
            params![
                new.folder_id,
                new.file_name,
                new.path,
                new.file_type,
                new.content_hash,
                new.size_bytes,
                new.dept_id,
                new.role_id,
                now,
            ],
        );

        match inserted {
            Ok(_) => Ok(CreateOutcome::Created(conn.last_insert_rowid())),
            Err(e) if is_unique_violation_on(&e, "documents.content_hash") => {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT doc_id FROM documents WHERE content_hash = ?1",
                        params![new.content_hash],
                        |row| row.get(0),
                    )
                    .optional()?;
                match existing {
                    Some(id) => Ok(CreateOutcome::DuplicateHash(id)),
                    None => Err(DocdexError::Database(e)),
                }
            }
            Err(e) => Err(DocdexError::Database(e)),
        }
    })
    .await
}

/// Flip a document to `indexed`, record its page count, clear any old error.
pub async fn mark_indexed(db: &Db, doc_id: i64, page_count: i64) -> Result<()> {
    db.with_connection(move |conn| {
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE documents SET status = 'indexed', page_count = ?2, error_msg = NULL, \
             updated_at = ?3 WHERE doc_id = ?1",
            params![doc_id, page_count, now],
        )?;
        if updated == 0 {
            return Err(DocdexError::DocumentNotFound(format!("doc_id={}", doc_id)));
        }
        Ok(())
    })
    .await
}

/// Flip a document to `failed` and retain a truncated error message.
pub async fn mark_failed(db: &Db, doc_id: i64, error_msg: &str) -> Result<()> {
    let msg = truncate_chars(error_msg, ERROR_MSG_MAX_CHARS);
    db.with_connection(move |conn| {
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE documents SET status = 'failed', error_msg = ?2, updated_at = ?3 \
             WHERE doc_id = ?1",
            params![doc_id, msg, now],
        )?;
        if updated == 0 {
            return Err(DocdexError::DocumentNotFound(format!("doc_id={}", doc_id)));
        }
        Ok(())
    })
    .await
}

/// Delete a document row. Chunks cascade via the foreign key.
pub async fn delete_document(db: &Db, doc_id: i64) -> Result<()> {
    db.with_connection(move |conn| {
        let deleted = conn.execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])?;
        if deleted == 0 {
            return Err(DocdexError::DocumentNotFound(format!("doc_id={}", doc_id)));
        }
        Ok(())
    })
    .await
}

/// Load every live document keyed by path for sync classification.
pub async fn active_by_path(db: &Db) -> Result<HashMap<String, DocumentRecord>> {
    db.with_connection(move |conn| {
        let sql = format!(
            "SELECT {} FROM documents WHERE status IN ('indexed', 'pending', 'processing', 'failed')",
            DOCUMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_document)?;
        let mut map = HashMap::new();
        for row in rows {
            let doc = row?;
            map.insert(doc.path.clone(), doc);
        }
        Ok::<HashMap<String, DocumentRecord>, DocdexError>(map)
    })
    .await
}

/// Document counts per status, for observability.
pub async fn count_by_status(db: &Db) -> Result<Vec<(String, i64)>> {
    db.with_connection(move |conn| {
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM documents GROUP BY status ORDER BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok::<Vec<(String, i64)>, DocdexError>(counts)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path);
        let migrations_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
        db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await
            .unwrap();
        (db, temp_dir)
    }

    fn sample_doc(path: &str, hash: &str, size: i64) -> NewDocument {
        NewDocument {
            folder_id: None,
            file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            file_type: "pdf".to_string(),
            content_hash: hash.to_string(),
            size_bytes: size,
            dept_id: 1,
            role_id: 3,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, _tmp) = setup_test_db().await;
        let outcome = create_processing(&db, sample_doc("/docs/a.pdf", "h1", 10))
            .await
            .unwrap();
        let doc_id = match outcome {
            CreateOutcome::Created(id) => id,
            other => panic!("expected Created, got {:?}", other),
        };

        let doc = get(&db, doc_id).await.unwrap();
        assert_eq!(doc.path, "/docs/a.pdf");
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(doc.size_bytes, 10);
        assert!(doc.error_msg.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_hash_returns_existing_id() {
        let (db, _tmp) = setup_test_db().await;
        let first = create_processing(&db, sample_doc("/docs/a.pdf", "same", 10))
            .await
            .unwrap();
        let CreateOutcome::Created(first_id) = first else {
            panic!("expected Created");
        };

        // Same content at a different path loses the race cleanly
        let second = create_processing(&db, sample_doc("/docs/copy.pdf", "same", 10))
            .await
            .unwrap();
        assert_eq!(second, CreateOutcome::DuplicateHash(first_id));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (db, _tmp) = setup_test_db().await;
        let CreateOutcome::Created(doc_id) =
            create_processing(&db, sample_doc("/docs/a.pdf", "h1", 10))
                .await
                .unwrap()
        else {
            panic!("expected Created");
        };

        mark_failed(&db, doc_id, "parse blew up").await.unwrap();
        let doc = get(&db, doc_id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error_msg.as_deref(), Some("parse blew up"));

        mark_indexed(&db, doc_id, 7).await.unwrap();
        let doc = get(&db, doc_id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Indexed);
        assert_eq!(doc.page_count, 7);
        assert!(doc.error_msg.is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_truncates_long_errors() {
        let (db, _tmp) = setup_test_db().await;
        let CreateOutcome::Created(doc_id) =
            create_processing(&db, sample_doc("/docs/a.pdf", "h1", 10))
                .await
                .unwrap()
        else {
            panic!("expected Created");
        };

        let long = "x".repeat(5000);
        mark_failed(&db, doc_id, &long).await.unwrap();
        let doc = get(&db, doc_id).await.unwrap();
        assert_eq!(doc.error_msg.unwrap().chars().count(), 1000);
    }

    #[tokio::test]
    async fn test_find_by_hash_and_active_by_path() {
        let (db, _tmp) = setup_test_db().await;
        create_processing(&db, sample_doc("/docs/a.pdf", "h1", 10))
            .await
            .unwrap();
        create_processing(&db, sample_doc("/docs/b.pdf", "h2", 20))
            .await
            .unwrap();

        let found = find_by_hash(&db, "h2").await.unwrap().unwrap();
        assert_eq!(found.path, "/docs/b.pdf");
        assert!(find_by_hash(&db, "missing").await.unwrap().is_none());

        let by_path = active_by_path(&db).await.unwrap();
        assert_eq!(by_path.len(), 2);
        assert!(by_path.contains_key("/docs/a.pdf"));
    }

    #[tokio::test]
    async fn test_delete_document() {
        let (db, _tmp) = setup_test_db().await;
        let CreateOutcome::Created(doc_id) =
            create_processing(&db, sample_doc("/docs/a.pdf", "h1", 10))
                .await
                .unwrap()
        else {
            panic!("expected Created");
        };

        delete_document(&db, doc_id).await.unwrap();
        assert!(matches!(
            get(&db, doc_id).await,
            Err(DocdexError::DocumentNotFound(_))
        ));
        // Path may be reused after deletion
        let outcome = create_processing(&db, sample_doc("/docs/a.pdf", "h1b", 11))
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(_)));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Indexed,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(DocumentStatus::parse("bogus").is_err());
    }
}
