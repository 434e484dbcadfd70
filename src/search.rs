use crate::db::chunks::embedding_from_bytes;
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{DocdexError, Result};
use serde::Serialize;

/// Search hits carry a content preview capped at this many chars.
const PREVIEW_MAX_CHARS: usize = 500;

/// One similarity search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub doc_id: i64,
    pub chunk_idx: i64,
    pub content: String,
    pub score: f32,
    pub file_name: String,
    pub page_number: Option<i64>,
}

/// Cosine similarity search over stored chunk vectors.
///
/// Embeds the query, scans all chunks that have an embedding (optionally
/// restricted to one document), and returns the top `k` hits with score >=
/// `min_score`, best first. Chunks whose stored vector dimensionality does
/// not match the query (e.g. written by an older model) are skipped with a
/// warning rather than failing the search.
pub async fn search_similar(
    db: &Db,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    min_score: f32,
    doc_id_filter: Option<i64>,
) -> Result<Vec<SearchResult>> {
    let query_vec = embedder.embed_query(query).await?;
    if query_vec.is_empty() {
        return Err(DocdexError::Embedding(
            "Empty query embedding".to_string(),
        ));
    }

    let rows = db
        .with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.chunk_id, c.doc_id, c.chunk_idx, c.content, c.page_number, \
                 c.embedding, d.file_name \
                 FROM chunks c \
                 JOIN documents d ON c.doc_id = d.doc_id \
                 WHERE c.embedding IS NOT NULL \
                 AND (?1 IS NULL OR c.doc_id = ?1)",
            )?;
            let mapped = stmt.query_map(rusqlite::params![doc_id_filter], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Vec<u8>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            Ok::<Vec<_>, DocdexError>(rows)
        })
        .await?;

    let mut results: Vec<SearchResult> = Vec::new();
    for (chunk_id, doc_id, chunk_idx, content, page_number, blob, file_name) in rows {
        let embedding = embedding_from_bytes(&blob)?;
        if embedding.len() != query_vec.len() {
            log::warn!(
                "Skipping chunk {} with stale embedding dimension {} (query has {})",
                chunk_id,
                embedding.len(),
                query_vec.len()
            );
            continue;
        }

        let score = cosine_similarity(&query_vec, &embedding);
        if score >= min_score {
            results.push(SearchResult {
                chunk_id,
                doc_id,
                chunk_idx,
                content: content.chars().take(PREVIEW_MAX_CHARS).collect(),
                score,
                file_name,
                page_number,
            });
        }
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(k);
    Ok(results)
}

/// Cosine similarity of two equal-length vectors; 0.0 when either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::{self, CreateOutcome, NewDocument};
    use crate::db::chunks::{insert_chunks_and_finalize, NewChunk};
    use crate::ingest::tests::setup_test_db;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Query embedder returning a fixed vector
    struct FixedQueryEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl Embedder for FixedQueryEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }

        fn model_tag(&self) -> &str {
            "fixed"
        }
    }

    async fn create_doc_with_chunks(
        db: &crate::db::Db,
        path: &str,
        hash: &str,
        chunks: Vec<(&str, Vec<f32>)>,
    ) -> i64 {
        let outcome = catalog::create_processing(
            db,
            NewDocument {
                folder_id: None,
                file_name: path.rsplit('/').next().unwrap().to_string(),
                path: path.to_string(),
                file_type: "txt".to_string(),
                content_hash: hash.to_string(),
                size_bytes: 1,
                dept_id: 1,
                role_id: 3,
            },
        )
        .await
        .unwrap();
        let CreateOutcome::Created(doc_id) = outcome else {
            panic!("expected Created");
        };
        let records = chunks
            .into_iter()
            .enumerate()
            .map(|(i, (content, embedding))| NewChunk {
                chunk_idx: i as i64,
                content: content.to_string(),
                token_count: 1,
                page_number: None,
                embedding: Some(embedding),
                embed_model: Some("fixed".to_string()),
            })
            .collect();
        insert_chunks_and_finalize(db, doc_id, 1, records).await.unwrap();
        doc_id
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let temp_dir = TempDir::new().unwrap();
        let db = setup_test_db(&temp_dir).await;
        create_doc_with_chunks(
            &db,
            "/docs/a.txt",
            "h1",
            vec![
                ("exact match", vec![1.0, 0.0]),
                ("orthogonal", vec![0.0, 1.0]),
                ("diagonal", vec![0.7, 0.7]),
            ],
        )
        .await;

        let embedder = FixedQueryEmbedder {
            vector: vec![1.0, 0.0],
        };
        let results = search_similar(&db, &embedder, "anything", 10, 0.5, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "exact match");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].content, "diagonal");
        assert!(results[1].score < results[0].score);
    }

    #[tokio::test]
    async fn test_search_doc_filter_and_k() {
        let temp_dir = TempDir::new().unwrap();
        let db = setup_test_db(&temp_dir).await;
        let doc_a = create_doc_with_chunks(
            &db,
            "/docs/a.txt",
            "h1",
            vec![("a0", vec![1.0, 0.0]), ("a1", vec![0.9, 0.1])],
        )
        .await;
        create_doc_with_chunks(&db, "/docs/b.txt", "h2", vec![("b0", vec![1.0, 0.0])]).await;

        let embedder = FixedQueryEmbedder {
            vector: vec![1.0, 0.0],
        };

        let filtered = search_similar(&db, &embedder, "q", 10, 0.0, Some(doc_a))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.doc_id == doc_a));

        let top_one = search_similar(&db, &embedder, "q", 1, 0.0, None).await.unwrap();
        assert_eq!(top_one.len(), 1);
    }

    #[tokio::test]
    async fn test_search_skips_mismatched_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let db = setup_test_db(&temp_dir).await;
        create_doc_with_chunks(
            &db,
            "/docs/a.txt",
            "h1",
            vec![("stale three-dim", vec![1.0, 0.0, 0.0]), ("good", vec![1.0, 0.0])],
        )
        .await;

        let embedder = FixedQueryEmbedder {
            vector: vec![1.0, 0.0],
        };
        let results = search_similar(&db, &embedder, "q", 10, 0.0, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "good");
    }
}
