//! Retrieval query tool.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::command::QueryRag;
use crate::core::xml::escape;
use crate::dispatch::Outcome;
use crate::io::retrieval::{DISTANCE_THRESHOLD, RetrievalIndex, TOP_K};

#[derive(Clone, Default)]
pub struct RetrievalTool {
    index: Option<Arc<dyn RetrievalIndex>>,
}

impl RetrievalTool {
    pub fn new(index: Option<Arc<dyn RetrievalIndex>>) -> Self {
        Self { index }
    }

    pub fn is_configured(&self) -> bool {
        self.index.is_some()
    }

    #[instrument(skip_all)]
    pub async fn query_rag(&self, cmd: &QueryRag) -> Result<Outcome> {
        let Some(index) = &self.index else {
            return Ok(Outcome::soft_error("RAG corpus is not set."));
        };
        let hits = index
            .query(&cmd.query, TOP_K, DISTANCE_THRESHOLD)
            .await
            .context("query retrieval index")?;
        debug!(hits = hits.len(), "retrieval done");
        if hits.is_empty() {
            return Ok(Outcome::observe(
                "No documents matched the query. Try different wording or another tool.",
            ));
        }
        let documents: Vec<String> = hits
            .iter()
            .map(|hit| {
                format!(
                    "<document source=\"{}\" score=\"{:.3}\">\n{}\n</document>",
                    escape(&hit.source),
                    hit.score,
                    hit.text.trim_end()
                )
            })
            .collect();
        Ok(Outcome::observe(documents.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SearchHit;
    use crate::test_support::MemoryRetrievalIndex;

    fn query() -> QueryRag {
        QueryRag {
            query: "rotate keys".to_string(),
        }
    }

    #[tokio::test]
    async fn unset_index_is_a_soft_error() {
        let outcome = RetrievalTool::default().query_rag(&query()).await.expect("query");
        assert_eq!(outcome, Outcome::soft_error("RAG corpus is not set."));
    }

    #[tokio::test]
    async fn renders_hits_and_passes_fixed_limits() {
        let index = Arc::new(MemoryRetrievalIndex::with_hits(vec![SearchHit {
            source: "https://x/1".to_string(),
            score: 0.25,
            text: "Keys rotate monthly.\n".to_string(),
        }]));
        let outcome = RetrievalTool::new(Some(index.clone()))
            .query_rag(&query())
            .await
            .expect("query");
        assert_eq!(
            outcome.observation,
            "<document source=\"https://x/1\" score=\"0.250\">\nKeys rotate monthly.\n</document>"
        );
        assert_eq!(index.queries(), vec![("rotate keys".to_string(), 10, 0.7)]);
    }

    #[tokio::test]
    async fn zero_hits_is_a_soft_success() {
        let index = Arc::new(MemoryRetrievalIndex::default());
        let outcome = RetrievalTool::new(Some(index)).query_rag(&query()).await.expect("query");
        assert!(!outcome.is_soft_error());
        assert!(outcome.observation.starts_with("No documents matched"));
    }
}
