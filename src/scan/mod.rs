pub mod hash;

pub use hash::fingerprint;

use crate::error::{DocdexError, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions scanned by default (lowercase, no leading dot): the formats the
/// layout/OCR service handles plus the locally-parsed text formats.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "xlsx", "xls", "pptx", "png", "jpg", "jpeg", "tif", "tiff", "txt", "md",
];

/// One filesystem entry produced by a scan. Regenerated on every scan, never
/// persisted.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    /// Lowercase extension without the leading dot.
    pub extension: String,
    pub size: u64,
    /// Content fingerprint; empty when hashing was skipped.
    pub hash: String,
}

/// Deterministic inventory of one directory scan
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub directory: PathBuf,
    pub total_files: usize,
    pub files: Vec<FileInfo>,
    pub by_type: BTreeMap<String, usize>,
}

/// Scan options
///
/// Hashing is opt-in because it is O(file size) and the scanner doubles as a
/// lightweight listing tool. With a glob pattern the pattern itself controls
/// depth (`**` recurses); the `recursive` flag applies to plain walks.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub extensions: Option<HashSet<String>>,
    pub pattern: Option<String>,
    pub recursive: bool,
    pub compute_hash: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: None,
            pattern: None,
            recursive: true,
            compute_hash: false,
        }
    }
}

/// Normalize an extension filter entry: lowercase, no leading dot.
fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// Scan a directory for supported files.
///
/// Returns the retained candidates sorted by file name ascending so repeated
/// scans of the same tree produce identical output. Fails wholesale: a bad
/// root is `DirectoryNotFound`, and any per-file stat/hash error aborts the
/// scan rather than yielding a partial listing.
pub fn scan_files(root: &Path, options: &ScanOptions) -> Result<ScanResult> {
    if !root.is_dir() {
        return Err(DocdexError::DirectoryNotFound(root.display().to_string()));
    }

    let allowed: HashSet<String> = match &options.extensions {
        Some(set) => set.iter().map(|e| normalize_ext(e)).collect(),
        None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
    };

    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(pattern) = &options.pattern {
        let full_pattern = root.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();
        let paths = glob::glob(&full_pattern).map_err(|e| {
            DocdexError::InvalidInput(format!("Invalid glob pattern {}: {}", pattern, e))
        })?;
        for entry in paths {
            let path = entry.map_err(|e| DocdexError::Io(e.into_error()))?;
            if path.is_file() {
                candidates.push(path);
            }
        }
    } else {
        let mut walker = WalkDir::new(root).follow_links(true);
        if !options.recursive {
            walker = walker.max_depth(1);
        }
        for entry in walker {
            let entry = entry.map_err(|e| DocdexError::Io(e.into()))?;
            if entry.file_type().is_file() {
                candidates.push(entry.into_path());
            }
        }
    }

    let mut files: Vec<FileInfo> = Vec::new();
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();

    for path in candidates {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !allowed.contains(&extension) {
            continue;
        }

        let metadata = std::fs::metadata(&path)?;
        let hash = if options.compute_hash {
            fingerprint(&path)?
        } else {
            String::new()
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        *by_type.entry(extension.clone()).or_insert(0) += 1;
        files.push(FileInfo {
            path,
            name,
            extension,
            size: metadata.len(),
            hash,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));

    log::info!("Scanned {}: {} files found", root.display(), files.len());

    Ok(ScanResult {
        directory: root.to_path_buf(),
        total_files: files.len(),
        files,
        by_type,
    })
}
