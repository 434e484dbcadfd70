use thiserror::Error;

/// Main error type for Docdex
#[derive(Error, Debug)]
pub enum DocdexError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document parse errors (layout/OCR service or local parsers)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Embedding service errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Document not found in the catalog
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Scan root missing or not a directory
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using DocdexError
pub type Result<T> = std::result::Result<T, DocdexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocdexError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: DocdexError = rusqlite_err.into();
        assert!(matches!(err, DocdexError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DocdexError = io_err.into();
        assert!(matches!(err, DocdexError::Io(_)));
    }
}
