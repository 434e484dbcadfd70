use crate::error::{DocdexError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::task;

pub mod catalog;
pub mod chunks;
pub mod jobs;
pub mod migrate;

/// Database connection wrapper
///
/// Holds the catalog path and opens short-lived connections on a blocking
/// thread for each unit of work. Every connection gets the same pragma set.
pub struct Db {
    path: std::path::PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Open a new database connection with optimized pragmas
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(DocdexError::Database)?;
        configure_connection(&conn)?;
        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path).map_err(DocdexError::Database)?;
            configure_connection(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DocdexError::Config(format!("Database task panicked: {}", e)))?
    }
}

/// Set SQLite pragmas for performance and integrity.
///
/// WAL mode for better concurrency, NORMAL sync for speed, foreign keys so
/// chunk rows cascade with their document, memory temp store, 64MB cache,
/// 256MB mmap for large catalogs.
fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA temp_store = MEMORY; \
         PRAGMA cache_size = -65536; \
         PRAGMA mmap_size = 268435456; \
         PRAGMA wal_autocheckpoint = 1000;",
    )?;
    Ok(())
}
