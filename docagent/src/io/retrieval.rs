//! Retrieval index port ("RAG corpus").

use anyhow::Result;
use async_trait::async_trait;

use crate::core::types::SearchHit;

/// Hits returned per query.
pub const TOP_K: usize = 10;
/// Hits farther than this vector distance are dropped by the index.
pub const DISTANCE_THRESHOLD: f64 = 0.7;

#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn query(&self, query: &str, top_k: usize, threshold: f64) -> Result<Vec<SearchHit>>;

    async fn upload(&self, source: &str, text: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<String>>;

    async fn delete(&self, source: &str) -> Result<()>;
}
