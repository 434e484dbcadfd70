use super::{truncate_chars, IngestOptions, Ingestor};
use crate::error::Result;
use crate::scan::{scan_files, ScanOptions};
use serde::Serialize;
use std::path::Path;

/// Per-file errors in batch details are capped at this many chars.
const DETAIL_ERROR_MAX_CHARS: usize = 200;

/// Outcome of one file in a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    Skipped,
    Error,
}

/// Per-file detail row in a batch report
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of a batch ingestion run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub details: Vec<FileOutcome>,
}

/// Scan a directory once, then run the pipeline for every matched file.
///
/// Used for one-shot bulk imports and API-triggered directory ingestion —
/// unlike the sync engine it never deletes anything. A dedup outcome
/// (fingerprint already indexed) is reported as `skipped`; any pipeline
/// failure is reported as `failed` with a truncated error in `details` and
/// never aborts the run.
pub async fn scan_and_ingest(
    ingestor: &Ingestor<'_>,
    root: &Path,
    scan_options: &ScanOptions,
    ingest_options: &IngestOptions,
) -> Result<BatchReport> {
    let scan = scan_files(root, scan_options)?;

    let mut report = BatchReport {
        total: scan.total_files,
        ..Default::default()
    };

    for file in &scan.files {
        match ingestor.ingest(&file.path, ingest_options).await {
            Ok(outcome) if outcome.is_deduplicated() => {
                report.skipped += 1;
                report.details.push(FileOutcome {
                    file: file.name.clone(),
                    status: FileStatus::Skipped,
                    doc_id: Some(outcome.doc_id()),
                    error: None,
                });
            }
            Ok(outcome) => {
                report.success += 1;
                report.details.push(FileOutcome {
                    file: file.name.clone(),
                    status: FileStatus::Ok,
                    doc_id: Some(outcome.doc_id()),
                    error: None,
                });
            }
            Err(e) => {
                report.failed += 1;
                report.details.push(FileOutcome {
                    file: file.name.clone(),
                    status: FileStatus::Error,
                    doc_id: None,
                    error: Some(truncate_chars(&e.to_string(), DETAIL_ERROR_MAX_CHARS)),
                });
                log::error!("Failed to ingest {}: {}", file.name, e);
            }
        }
    }

    log::info!(
        "Batch ingest: total={}, success={}, failed={}, skipped={}",
        report.total,
        report.success,
        report.failed,
        report.skipped
    );

    Ok(report)
}
