pub mod layout;
pub mod text;

use crate::config::ParserConfig;
use crate::error::{DocdexError, Result};
use async_trait::async_trait;
use std::path::Path;

/// One page of parsed document content
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub page_number: i64,
    pub text: String,
}

/// A fully parsed document
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub pages: Vec<ParsedPage>,
    pub raw_text: String,
    pub total_pages: i64,
    pub metadata: serde_json::Value,
}

/// Contract for document parsers.
///
/// Implementations declare which extensions they handle and turn a file into
/// raw text plus page boundaries. Parsing may call out to the layout/OCR
/// service, so the method is async and carries its own timeout.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Check if this parser can handle the given (lowercase, bare) extension
    fn can_parse(&self, extension: &str) -> bool;

    /// Parse the file into pages and raw text
    async fn parse(&self, path: &Path) -> Result<ParseResult>;
}

/// Capability-dispatch table: extension -> parser.
///
/// New formats register a parser; the dispatch logic never changes.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Create a registry with the built-in parsers: layout-service parsing
    /// for document formats, OCR for images, local reading for plain text.
    pub fn from_config(config: &ParserConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(layout::LayoutServiceParser::documents(config)));
        registry.register(Box::new(layout::LayoutServiceParser::images(config)));
        registry.register(Box::new(text::TextParser));
        registry
    }

    /// Register a parser
    pub fn register(&mut self, parser: Box<dyn DocumentParser>) {
        self.parsers.push(parser);
    }

    /// Find a parser that can handle the given extension
    pub fn find_parser(&self, extension: &str) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(extension))
            .map(|p| p.as_ref())
    }

    /// Parse a file with the parser registered for its extension.
    ///
    /// A failure here is a pipeline failure that marks the document `failed`
    /// — there is deliberately no fallback parser.
    pub async fn parse(&self, path: &Path, extension: &str) -> Result<ParseResult> {
        let parser = self.find_parser(extension).ok_or_else(|| {
            DocdexError::Parse(format!("No parser found for extension: {}", extension))
        })?;
        parser.parse(path).await
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
