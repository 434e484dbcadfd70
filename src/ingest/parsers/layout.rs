use super::{DocumentParser, ParseResult, ParsedPage};
use crate::config::ParserConfig;
use crate::error::{DocdexError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Formats sent to the layout-analysis service with automatic method
/// selection.
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx", "xls", "pptx"];

/// Formats sent in OCR mode.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

/// Request structure for the layout service /parse endpoint
#[derive(Serialize)]
struct ParseRequest<'a> {
    file_path: &'a str,
    method: &'a str,
    backend: &'a str,
    lang: &'a str,
}

/// One page in the service response
#[derive(Deserialize)]
struct PageData {
    page_num: i64,
    text: String,
}

/// Response structure from the layout service
#[derive(Deserialize)]
struct ParseResponse {
    pages: Vec<PageData>,
    markdown: String,
    total_pages: i64,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// Parser backed by the layout-analysis/OCR HTTP service.
///
/// The service mounts the same document tree, so requests carry the file
/// path rather than the file body. Layout analysis of a large scan can take
/// minutes, hence the long configured timeout.
pub struct LayoutServiceParser {
    client: Client,
    base_url: String,
    backend: String,
    lang: String,
    method: &'static str,
    extensions: &'static [&'static str],
}

impl LayoutServiceParser {
    /// Parser instance for document formats (automatic method selection)
    pub fn documents(config: &ParserConfig) -> Self {
        Self::with_method(config, "auto", DOCUMENT_EXTENSIONS)
    }

    /// Parser instance for image formats (forced OCR)
    pub fn images(config: &ParserConfig) -> Self {
        Self::with_method(config, "ocr", IMAGE_EXTENSIONS)
    }

    fn with_method(
        config: &ParserConfig,
        method: &'static str,
        extensions: &'static [&'static str],
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.layout_url.trim_end_matches('/').to_string(),
            backend: config.backend.clone(),
            lang: config.lang.clone(),
            method,
            extensions,
        }
    }
}

#[async_trait]
impl DocumentParser for LayoutServiceParser {
    fn can_parse(&self, extension: &str) -> bool {
        self.extensions.contains(&extension)
    }

    async fn parse(&self, path: &Path) -> Result<ParseResult> {
        let file_path = path.to_string_lossy();
        let request = ParseRequest {
            file_path: &file_path,
            method: self.method,
            backend: &self.backend,
            lang: &self.lang,
        };

        let response = self
            .client
            .post(format!("{}/parse", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                DocdexError::Parse(format!(
                    "Layout service request failed for {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            // The service reports failures as {"detail": "..."}
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").map(|d| d.to_string()))
                .unwrap_or(body);
            return Err(DocdexError::Parse(format!(
                "Layout service error {} for {}: {}",
                status,
                path.display(),
                detail
            )));
        }

        let data: ParseResponse = response.json().await.map_err(|e| {
            DocdexError::Parse(format!("Failed to parse layout service response: {}", e))
        })?;

        Ok(ParseResult {
            pages: data
                .pages
                .into_iter()
                .map(|p| ParsedPage {
                    page_number: p.page_num,
                    text: p.text,
                })
                .collect(),
            raw_text: data.markdown,
            total_pages: data.total_pages,
            metadata: data.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_routing() {
        let config = ParserConfig::default();
        let docs = LayoutServiceParser::documents(&config);
        let images = LayoutServiceParser::images(&config);

        assert!(docs.can_parse("pdf"));
        assert!(docs.can_parse("xlsx"));
        assert!(!docs.can_parse("png"));

        assert!(images.can_parse("png"));
        assert!(images.can_parse("tiff"));
        assert!(!images.can_parse("pdf"));
        assert_eq!(images.method, "ocr");
        assert_eq!(docs.method, "auto");
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let config = ParserConfig {
            layout_url: "http://layout:9000/".to_string(),
            ..Default::default()
        };
        let docs = LayoutServiceParser::documents(&config);
        assert_eq!(docs.base_url, "http://layout:9000");
    }

    #[test]
    fn test_response_deserialization() {
        let body = r#"{
            "pages": [{"page_num": 1, "text": "hello"}],
            "markdown": "hello",
            "total_pages": 1,
            "metadata": {"engine": "pipeline"}
        }"#;
        let parsed: ParseResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.pages.len(), 1);
        assert_eq!(parsed.pages[0].page_num, 1);
        assert_eq!(parsed.total_pages, 1);

        // metadata is optional
        let no_meta = r#"{"pages": [], "markdown": "", "total_pages": 0}"#;
        let parsed: ParseResponse = serde_json::from_str(no_meta).unwrap();
        assert!(parsed.metadata.is_null());
    }
}
