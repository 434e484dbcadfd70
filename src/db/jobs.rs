use crate::db::Db;
use crate::error::{DocdexError, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

/// A sync job-run record, written for observability only
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: i64,
    pub job_name: String,
    pub job_type: String,
    pub status: String,
    pub last_run_at: Option<String>,
    pub next_run_at: Option<String>,
    pub last_error: Option<String>,
}

/// Insert a `running` job row stamped with the current time.
pub async fn start_run(db: &Db, job_name: &str, job_type: &str) -> Result<i64> {
    let job_name = job_name.to_string();
    let job_type = job_type.to_string();
    db.with_connection(move |conn| {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO sync_jobs (job_name, job_type, status, last_run_at) \
             VALUES (?1, ?2, 'running', ?3)",
            params![job_name, job_type, now],
        )?;
        Ok::<i64, DocdexError>(conn.last_insert_rowid())
    })
    .await
}

/// Close a job row as `completed` or `completed_with_errors`.
///
/// The stats summary is recorded in last_error only when the run had errors,
/// so a clean run leaves the column NULL.
pub async fn finish_run(db: &Db, job_id: i64, had_errors: bool, summary: &str) -> Result<()> {
    let status = if had_errors {
        "completed_with_errors"
    } else {
        "completed"
    };
    let last_error = had_errors.then(|| format!("Stats: {}", summary));
    db.with_connection(move |conn| {
        let updated = conn.execute(
            "UPDATE sync_jobs SET status = ?2, last_error = ?3 WHERE job_id = ?1",
            params![job_id, status, last_error],
        )?;
        if updated == 0 {
            return Err(DocdexError::InvalidInput(format!(
                "Unknown sync job id: {}",
                job_id
            )));
        }
        Ok(())
    })
    .await
}

/// Most recent run for a job name, if any.
pub async fn last_run(db: &Db, job_name: &str) -> Result<Option<JobRecord>> {
    let job_name = job_name.to_string();
    db.with_connection(move |conn| {
        let job = conn
            .query_row(
                "SELECT job_id, job_name, job_type, status, last_run_at, next_run_at, last_error \
                 FROM sync_jobs WHERE job_name = ?1 ORDER BY job_id DESC LIMIT 1",
                params![job_name],
                |row| {
                    Ok(JobRecord {
                        job_id: row.get(0)?,
                        job_name: row.get(1)?,
                        job_type: row.get(2)?,
                        status: row.get(3)?,
                        last_run_at: row.get(4)?,
                        next_run_at: row.get(5)?,
                        last_error: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok::<Option<JobRecord>, DocdexError>(job)
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

    #[tokio::test]
    async fn test_job_lifecycle_clean() {
        let (db, _tmp) = setup_test_db().await;
        let job_id = start_run(&db, "daily_sync", "watch_sync").await.unwrap();

        let running = last_run(&db, "daily_sync").await.unwrap().unwrap();
        assert_eq!(running.status, "running");
        assert!(running.last_run_at.is_some());

        finish_run(&db, job_id, false, "new=0").await.unwrap();
        let done = last_run(&db, "daily_sync").await.unwrap().unwrap();
        assert_eq!(done.status, "completed");
        assert!(done.last_error.is_none());
    }

    #[tokio::test]
    async fn test_job_lifecycle_with_errors() {
        let (db, _tmp) = setup_test_db().await;
        let job_id = start_run(&db, "daily_sync", "watch_sync").await.unwrap();
        finish_run(&db, job_id, true, "new=1, errors=2").await.unwrap();

        let done = last_run(&db, "daily_sync").await.unwrap().unwrap();
        assert_eq!(done.status, "completed_with_errors");
        assert!(done.last_error.unwrap().contains("errors=2"));
    }

    #[tokio::test]
    async fn test_last_run_picks_newest() {
        let (db, _tmp) = setup_test_db().await;
        let first = start_run(&db, "daily_sync", "watch_sync").await.unwrap();
        finish_run(&db, first, false, "").await.unwrap();
        start_run(&db, "daily_sync", "watch_sync").await.unwrap();

        let latest = last_run(&db, "daily_sync").await.unwrap().unwrap();
        assert_eq!(latest.status, "running");
        assert!(last_run(&db, "other").await.unwrap().is_none());
    }
}
