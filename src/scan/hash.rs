use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Compute the SHA-256 content fingerprint of a file.
///
/// Reads in fixed 8 KiB blocks so large documents never have to fit in
/// memory. Identical bytes always yield the identical digest, independent of
/// path or mtime. Fails with an IO error if the path is unreadable and never
/// returns a partial digest.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "test content").unwrap();

        let hash = fingerprint(&file_path).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_depends_only_on_content() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("subdir-name-differs.txt");
        fs::write(&a, "same bytes").unwrap();
        fs::write(&b, "same bytes").unwrap();

        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());

        fs::write(&b, "different bytes").unwrap();
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_spans_multiple_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("big.bin");
        // Three full blocks plus a tail
        fs::write(&file_path, vec![0xAB; 8192 * 3 + 17]).unwrap();

        let first = fingerprint(&file_path).unwrap();
        let second = fingerprint(&file_path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fingerprint_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = fingerprint(&temp_dir.path().join("nope.txt"));
        assert!(result.is_err());
    }
}
