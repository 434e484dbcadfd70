pub mod batch;
pub mod chunker;
pub mod parsers;

pub use batch::{scan_and_ingest, BatchReport, FileOutcome, FileStatus};
pub use chunker::{chunk_text, estimate_tokens, Chunk};
pub use parsers::{DocumentParser, ParseResult, ParsedPage, ParserRegistry};

use crate::config::Config;
use crate::db::catalog::{self, CreateOutcome, NewDocument};
use crate::db::chunks::NewChunk;
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{DocdexError, Result};
use std::path::Path;

/// Per-ingest attributes and overrides
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub folder_id: Option<i64>,
    pub dept_id: i64,
    pub role_id: i64,
    /// Per-call chunking overrides; None uses the configured defaults.
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            folder_id: None,
            dept_id: 1,
            role_id: 3,
            chunk_size: None,
            chunk_overlap: None,
        }
    }
}

impl IngestOptions {
    /// Options carrying the configured default ownership attributes
    pub fn from_config(config: &Config) -> Self {
        Self {
            dept_id: config.ingest.dept_id,
            role_id: config.ingest.role_id,
            ..Default::default()
        }
    }
}

/// Result of one pipeline run.
///
/// `Deduplicated` means the content fingerprint was already catalogued —
/// including when this run lost a creation race — so no work was done. The
/// variant lets batch callers report a skip without parsing error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed { doc_id: i64, chunk_count: usize },
    Deduplicated { doc_id: i64 },
}

impl IngestOutcome {
    pub fn doc_id(&self) -> i64 {
        match self {
            IngestOutcome::Indexed { doc_id, .. } => *doc_id,
            IngestOutcome::Deduplicated { doc_id } => *doc_id,
        }
    }

    pub fn is_deduplicated(&self) -> bool {
        matches!(self, IngestOutcome::Deduplicated { .. })
    }
}

/// The document pipeline with its injected collaborators.
///
/// Built once by the process shell (db, parser registry, embedder, config)
/// and shared by the batch runner and sync engine. No hidden singletons.
pub struct Ingestor<'a> {
    db: &'a Db,
    parsers: &'a ParserRegistry,
    embedder: &'a dyn Embedder,
    config: &'a Config,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        db: &'a Db,
        parsers: &'a ParserRegistry,
        embedder: &'a dyn Embedder,
        config: &'a Config,
    ) -> Self {
        Self {
            db,
            parsers,
            embedder,
            config,
        }
    }

    pub fn db(&self) -> &Db {
        self.db
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Run the full pipeline for one file: fingerprint, dedup, parse, chunk,
    /// embed, persist.
    ///
    /// Idempotent under identical content regardless of path: a fingerprint
    /// already in the catalog short-circuits before any expensive work. The
    /// document row is created in `processing` before parsing starts, so a
    /// crash mid-pipeline leaves a discoverable row rather than silent loss.
    /// Any failure after row creation marks the document `failed` (with a
    /// truncated error message) and propagates to the caller.
    pub async fn ingest(&self, path: &Path, opts: &IngestOptions) -> Result<IngestOutcome> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_type = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        let content_hash = crate::scan::fingerprint(path)?;
        let size_bytes = std::fs::metadata(path)?.len() as i64;

        if let Some(existing) = catalog::find_by_hash(self.db, &content_hash).await? {
            log::info!(
                "Document already indexed (hash={}): {}",
                &content_hash[..12],
                file_name
            );
            return Ok(IngestOutcome::Deduplicated {
                doc_id: existing.doc_id,
            });
        }

        let new_doc = NewDocument {
            folder_id: opts.folder_id,
            file_name: file_name.clone(),
            path: path.to_string_lossy().to_string(),
            file_type: file_type.clone(),
            content_hash: content_hash.clone(),
            size_bytes,
            dept_id: opts.dept_id,
            role_id: opts.role_id,
        };
        let doc_id = match catalog::create_processing(self.db, new_doc).await? {
            CreateOutcome::Created(id) => id,
            CreateOutcome::DuplicateHash(id) => {
                log::info!(
                    "Concurrent ingest won the race for hash={}, reusing doc_id={}",
                    &content_hash[..12],
                    id
                );
                return Ok(IngestOutcome::Deduplicated { doc_id: id });
            }
        };

        match self.process(doc_id, path, &file_type, opts).await {
            Ok(chunk_count) => {
                log::info!(
                    "Ingested {}: doc_id={}, chunks={}",
                    file_name,
                    doc_id,
                    chunk_count
                );
                Ok(IngestOutcome::Indexed {
                    doc_id,
                    chunk_count,
                })
            }
            Err(e) => {
                if let Err(mark_err) = catalog::mark_failed(self.db, doc_id, &e.to_string()).await
                {
                    log::error!(
                        "Failed to record failure for doc_id={}: {}",
                        doc_id,
                        mark_err
                    );
                }
                log::error!("Failed to ingest {}: {}", file_name, e);
                Err(e)
            }
        }
    }

    /// Steps 4-8: parse, chunk, embed, persist. Failures propagate to
    /// `ingest` which records them on the document row.
    async fn process(
        &self,
        doc_id: i64,
        path: &Path,
        file_type: &str,
        opts: &IngestOptions,
    ) -> Result<usize> {
        let parsed = self.parsers.parse(path, file_type).await?;
        log::info!("Parsed {}: {} pages", path.display(), parsed.total_pages);

        let chunk_size = opts
            .chunk_size
            .unwrap_or(self.config.chunking.chunk_size_tokens);
        let chunk_overlap = opts
            .chunk_overlap
            .unwrap_or(self.config.chunking.chunk_overlap_tokens);
        let chunks = chunker::chunk_text(&parsed.raw_text, chunk_size, chunk_overlap);

        if chunks.is_empty() {
            // Empty or unparseable content is a valid terminal state
            catalog::mark_indexed(self.db, doc_id, parsed.total_pages).await?;
            log::warn!("No chunks produced for {}", path.display());
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(DocdexError::Embedding(format!(
                "Embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }
        log::info!("Embedded {} chunks for {}", chunks.len(), path.display());

        let model_tag = self.embedder.model_tag().to_string();
        let records: Vec<NewChunk> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewChunk {
                chunk_idx: chunk.index as i64,
                content: chunk.text.clone(),
                token_count: chunk.token_count as i64,
                page_number: find_page_for_chunk(&parsed, &chunk.text),
                embedding: Some(embedding),
                embed_model: Some(model_tag.clone()),
            })
            .collect();

        crate::db::chunks::insert_chunks_and_finalize(self.db, doc_id, parsed.total_pages, records)
            .await
    }
}

/// Best-effort page attribution: the first parsed page containing the
/// chunk's leading substring wins. Can misattribute when early chunk text
/// repeats across pages; first-match behavior is intentional.
fn find_page_for_chunk(result: &ParseResult, chunk_text: &str) -> Option<i64> {
    let prefix: String = chunk_text.chars().take(100).collect();
    if prefix.is_empty() {
        return None;
    }
    result
        .pages
        .iter()
        .find(|p| p.text.contains(&prefix))
        .map(|p| p.page_number)
}

/// Truncate to a character count, never splitting a multi-byte char.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
