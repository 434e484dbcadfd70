use crate::db::Db;
use crate::error::{DocdexError, Result};
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

/// A chunk ready to be persisted for a document
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_idx: i64,
    pub content: String,
    pub token_count: i64,
    pub page_number: Option<i64>,
    pub embedding: Option<Vec<f32>>,
    pub embed_model: Option<String>,
}

/// A persisted chunk row
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk_id: i64,
    pub doc_id: i64,
    pub chunk_idx: i64,
    pub content: String,
    pub token_count: i64,
    pub page_number: Option<i64>,
    pub vector_ref: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub embed_model: Option<String>,
}

/// Encode an embedding as little-endian f32 bytes for BLOB storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a BLOB back into an embedding vector.
pub fn embedding_from_bytes(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(DocdexError::Embedding(
            "Invalid embedding BLOB length".to_string(),
        ));
    }
    let mut floats = Vec::with_capacity(blob.len() / 4);
    for bytes in blob.chunks(4) {
        let arr: [u8; 4] = bytes
            .try_into()
            .map_err(|_| DocdexError::Embedding("Invalid embedding BLOB length".to_string()))?;
        floats.push(f32::from_le_bytes(arr));
    }
    Ok(floats)
}

/// Persist a document's chunk set and flip the document to `indexed`.
///
/// Runs in one transaction: any stale chunks for the document are removed,
/// the new batch is inserted (100 rows per prepared-statement batch), and the
/// document row is updated with `indexed` status and its page count. Either
/// the whole chunk set lands with the status flip or nothing does.
pub async fn insert_chunks_and_finalize(
    db: &Db,
    doc_id: i64,
    page_count: i64,
    chunks: Vec<NewChunk>,
) -> Result<usize> {
    let count = db
        .with_connection(move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now().to_rfc3339();

            tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc_id])?;

            const BATCH_SIZE: usize = 100;
            let mut inserted = 0;
            for batch in chunks.chunks(BATCH_SIZE) {
                let mut stmt = tx.prepare(
                    "INSERT INTO chunks (
                        doc_id, chunk_idx, content, token_count, page_number,
                        vector_ref, embedding, embed_model, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for chunk in batch {
                    let blob = chunk.embedding.as_deref().map(embedding_to_bytes);
                    let vector_ref = chunk
                        .embedding
                        .as_ref()
                        .map(|_| Uuid::new_v4().to_string());
                    stmt.execute(params![
                        doc_id,
                        chunk.chunk_idx,
                        chunk.content,
                        chunk.token_count,
                        chunk.page_number,
                        vector_ref,
                        blob,
                        chunk.embed_model,
                        now,
                    ])?;
                }
                inserted += batch.len();
            }

            let updated = tx.execute(
                "UPDATE documents SET status = 'indexed', page_count = ?2, error_msg = NULL, \
                 updated_at = ?3 WHERE doc_id = ?1",
                params![doc_id, page_count, now],
            )?;
            if updated == 0 {
                return Err(DocdexError::DocumentNotFound(format!("doc_id={}", doc_id)));
            }

            tx.commit()?;
            Ok::<usize, DocdexError>(inserted)
        })
        .await?;

    Ok(count)
}

/// All chunks of a document in index order.
pub async fn for_document(db: &Db, doc_id: i64) -> Result<Vec<ChunkRecord>> {
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT chunk_id, doc_id, chunk_idx, content, token_count, page_number, \
             vector_ref, embedding, embed_model \
             FROM chunks WHERE doc_id = ?1 ORDER BY chunk_idx",
        )?;
        let rows = stmt.query_map(params![doc_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<i64>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<Vec<u8>>>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (chunk_id, doc_id, chunk_idx, content, token_count, page_number, vector_ref, blob, embed_model) =
                row?;
            let embedding = match blob {
                Some(bytes) => Some(embedding_from_bytes(&bytes)?),
                None => None,
            };
            chunks.push(ChunkRecord {
                chunk_id,
                doc_id,
                chunk_idx,
                content,
                token_count,
                page_number,
                vector_ref,
                embedding,
                embed_model,
            });
        }
        Ok::<Vec<ChunkRecord>, DocdexError>(chunks)
    })
    .await
}

/// Chunk count for one document.
pub async fn count_for_document(db: &Db, doc_id: i64) -> Result<i64> {
    db.with_connection(move |conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE doc_id = ?1",
            params![doc_id],
            |row| row.get(0),
        )?;
        Ok::<i64, DocdexError>(count)
    })
    .await
}

/// Total chunk count across the catalog.
pub async fn count_all(db: &Db) -> Result<i64> {
    db.with_connection(move |conn| {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok::<i64, DocdexError>(count)
    })
    .await
}
