use crate::db::catalog::{self, DocumentRecord};
use crate::db::jobs;
use crate::error::Result;
use crate::ingest::{IngestOptions, Ingestor};
use crate::scan::{fingerprint, scan_files, ScanOptions};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

pub const SYNC_JOB_NAME: &str = "daily_sync";
pub const SYNC_JOB_TYPE: &str = "watch_sync";

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub new: usize,
    pub modified: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new={}, modified={}, deleted={}, unchanged={}, errors={}",
            self.new, self.modified, self.deleted, self.unchanged, self.errors
        )
    }
}

/// Reconcile the catalog against the watch directory.
///
/// Classification per path:
/// - on disk, not in catalog: ingest as **new**
/// - in catalog with a different size: **modified** (size mismatch is a
///   cheap, sufficient signal; no hash needed)
/// - in catalog with the same size: hash now — the only point hashing
///   happens — and treat a mismatch as **modified**, a match as
///   **unchanged**. A `failed` document with unchanged size and fingerprint
///   therefore stays failed and is never re-attempted (poison-file guard).
/// - in catalog, not on disk: **deleted**
///
/// Modified paths are handled as delete + re-ingest. New/modified files are
/// processed before the delete sweep so a rename nets as one new + one
/// delete. Processing order is the scanner's name-sorted order; the delete
/// sweep runs in sorted path order. A single path's failure increments
/// `errors` and never aborts the run.
///
/// A job-run record is written around the pass: `running` at the start,
/// `completed` or `completed_with_errors` (with the stats summary) at the
/// end. A missing watch directory aborts the whole call instead.
pub async fn run_sync(ingestor: &Ingestor<'_>) -> Result<SyncReport> {
    let watch_dir = ingestor.config().watch_dir();
    log::info!("Starting sync for: {}", watch_dir.display());

    // Cheap inventory: sizes only, no hashing
    let scan = scan_files(watch_dir, &ScanOptions::default())?;
    log::info!("Found {} files on disk", scan.total_files);

    let db = ingestor.db();
    let job_id = jobs::start_run(db, SYNC_JOB_NAME, SYNC_JOB_TYPE).await?;

    let catalog_by_path = catalog::active_by_path(db).await?;
    let disk_paths: HashSet<String> = scan
        .files
        .iter()
        .map(|f| f.path.to_string_lossy().to_string())
        .collect();

    let opts = IngestOptions::from_config(ingestor.config());
    let mut report = SyncReport::default();

    // Phase 1: new and modified files, in scanner order
    for file in &scan.files {
        let path_str = file.path.to_string_lossy().to_string();
        match catalog_by_path.get(&path_str) {
            None => match ingestor.ingest(&file.path, &opts).await {
                Ok(_) => {
                    report.new += 1;
                    log::info!("New file ingested: {}", path_str);
                }
                Err(e) => {
                    report.errors += 1;
                    log::error!("Error ingesting new file {}: {}", path_str, e);
                }
            },
            Some(doc) if doc.size_bytes != file.size as i64 => {
                match reingest(ingestor, doc, &opts).await {
                    Ok(()) => {
                        report.modified += 1;
                        log::info!("Modified file re-ingested (size changed): {}", path_str);
                    }
                    Err(e) => {
                        report.errors += 1;
                        log::error!("Error re-ingesting modified file {}: {}", path_str, e);
                    }
                }
            }
            Some(doc) => {
                // Same path and same size: compute the hash only now
                let current_hash = match fingerprint(&file.path) {
                    Ok(h) => h,
                    Err(e) => {
                        report.errors += 1;
                        log::error!("Error hashing file {}: {}", path_str, e);
                        continue;
                    }
                };

                if doc.content_hash != current_hash {
                    match reingest(ingestor, doc, &opts).await {
                        Ok(()) => {
                            report.modified += 1;
                            log::info!("Modified file re-ingested (same size): {}", path_str);
                        }
                        Err(e) => {
                            report.errors += 1;
                            log::error!("Error re-ingesting modified file {}: {}", path_str, e);
                        }
                    }
                } else {
                    report.unchanged += 1;
                }
            }
        }
    }

    // Phase 2: catalog entries whose path vanished from disk
    let mut missing: Vec<&DocumentRecord> = catalog_by_path
        .values()
        .filter(|doc| !disk_paths.contains(&doc.path))
        .collect();
    missing.sort_by(|a, b| a.path.cmp(&b.path));

    for doc in missing {
        match catalog::delete_document(db, doc.doc_id).await {
            Ok(()) => {
                report.deleted += 1;
                log::info!("Deleted file cleaned up: {}", doc.path);
            }
            Err(e) => {
                report.errors += 1;
                log::error!("Error cleaning up deleted file {}: {}", doc.path, e);
            }
        }
    }

    jobs::finish_run(db, job_id, report.errors > 0, &report.to_string()).await?;
    log::info!("Sync completed: {}", report);

    Ok(report)
}

/// Delete the stale record, then run the pipeline for the new content.
async fn reingest(
    ingestor: &Ingestor<'_>,
    old_doc: &DocumentRecord,
    opts: &IngestOptions,
) -> Result<()> {
    catalog::delete_document(ingestor.db(), old_doc.doc_id).await?;
    ingestor
        .ingest(std::path::Path::new(&old_doc.path), opts)
        .await?;
    Ok(())
}
