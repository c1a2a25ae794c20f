//! Knowledge source lookup tool.

use anyhow::{Context, Result};
use tracing::instrument;
use url::Url;

use crate::core::command::FindSource;
use crate::core::xml::escape;
use crate::dispatch::Outcome;
use crate::io::sources::{SourceLookup, SourceManager};

#[derive(Clone, Default)]
pub struct SourceTool {
    manager: SourceManager,
}

impl SourceTool {
    pub fn new(manager: SourceManager) -> Self {
        Self { manager }
    }

    #[instrument(skip_all, fields(uri = %cmd.uri))]
    pub async fn find_source(&self, cmd: &FindSource) -> Result<Outcome> {
        let Ok(uri) = Url::parse(&cmd.uri) else {
            return Ok(Outcome::soft_error(format!("Invalid URI: {}", cmd.uri)));
        };
        let lookup = self
            .manager
            .lookup(&uri)
            .await
            .with_context(|| format!("fetch source {uri}"))?;
        Ok(match lookup {
            SourceLookup::Found { backend, content } => Outcome::observe(format!(
                "<source uri=\"{}\" backend=\"{}\">\n{}\n</source>",
                escape(uri.as_str()),
                escape(&backend),
                content.trim_end()
            )),
            SourceLookup::NotFound => Outcome::soft_error(format!("Source not found: {uri}")),
            SourceLookup::Unsupported => {
                Outcome::soft_error(format!("Unsupported source: {uri}"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::StaticSource;

    fn tool() -> SourceTool {
        SourceTool::new(SourceManager::new().with(Arc::new(StaticSource::new(
            "chat",
            "chat.example.com",
            [("https://chat.example.com/p1", "ana: keys rotate monthly")],
        ))))
    }

    #[tokio::test]
    async fn invalid_uri_is_soft() {
        let outcome = tool()
            .find_source(&FindSource {
                uri: "not a uri".to_string(),
            })
            .await
            .expect("find");
        assert_eq!(outcome, Outcome::soft_error("Invalid URI: not a uri"));
    }

    #[tokio::test]
    async fn found_not_found_and_unsupported() {
        let tool = tool();
        let found = tool
            .find_source(&FindSource {
                uri: "https://chat.example.com/p1".to_string(),
            })
            .await
            .expect("find");
        assert!(found.observation.contains("ana: keys rotate monthly"));
        assert!(found.observation.contains("backend=\"chat\""));

        let missing = tool
            .find_source(&FindSource {
                uri: "https://chat.example.com/p2".to_string(),
            })
            .await
            .expect("find");
        assert!(missing.observation.starts_with("<error>Source not found"));

        let other = tool
            .find_source(&FindSource {
                uri: "https://wiki.example.com/x".to_string(),
            })
            .await
            .expect("find");
        assert!(other.observation.starts_with("<error>Unsupported source"));
    }
}
