pub mod cache;
pub mod http;

pub use cache::QueryCache;
pub use http::HttpEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Contract for the embedding service.
///
/// Implementations are constructed once by the process bootstrap and
/// injected into pipeline components. Document and query embeddings are
/// asymmetric: implementations may prefix or otherwise condition the text
/// differently for each side.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document chunks in one batch round trip
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier stamped on persisted chunks
    fn model_tag(&self) -> &str;
}
