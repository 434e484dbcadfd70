use super::{DocumentParser, ParseResult, ParsedPage};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Local parser for plain-text formats. Produces a single page.
pub struct TextParser;

#[async_trait]
impl DocumentParser for TextParser {
    fn can_parse(&self, extension: &str) -> bool {
        matches!(extension, "txt" | "md")
    }

    async fn parse(&self, path: &Path) -> Result<ParseResult> {
        let content = std::fs::read_to_string(path)?;
        Ok(ParseResult {
            pages: vec![ParsedPage {
                page_number: 1,
                text: content.clone(),
            }],
            raw_text: content,
            total_pages: 1,
            metadata: serde_json::Value::Null,
        })
    }
}
