//! Knowledge-store lookup exposed as a tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ToolInvocationError;
use crate::index::Retriever;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct KnowledgeLookupTool {
    retriever: Arc<Retriever>,
}

impl KnowledgeLookupTool {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

#[derive(Deserialize)]
struct Params {
    query: String,
}

#[async_trait]
impl Tool for KnowledgeLookupTool {
    fn name(&self) -> &str {
        "knowledge_lookup"
    }

    fn description(&self) -> &str {
        "Look up requirements, guidelines and internal documentation in the knowledge base. Returns relevant passages and the documents they come from."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look up"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match self.retriever.retrieve(&params.query, None).await {
            Ok(bundle) if bundle.found => ToolResult::success_data(json!({
                "context": bundle.chunks,
                "citations": bundle.citation_text(),
            })),
            Ok(_) => {
                ToolResult::error("No such information found, this task will not be completed.")
            }
            Err(e) => {
                tracing::warn!(user_id = %ctx.session.user_id, error = %e, "Knowledge lookup failed");
                ToolResult::from_error(&ToolInvocationError::Service(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::retrieval::test_support::*;
    use crate::index::RetrievalConfig;
    use crate::tools::implementations::test_support::run;

    async fn tool(distance: f32) -> KnowledgeLookupTool {
        let store = store_with(
            "kb",
            &[
                ("0_chunk_0", "style.md", at_distance(distance)),
                ("0_chunk_1", "style.md", at_distance(distance)),
            ],
        )
        .await;
        let retriever = Retriever::new(
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            store,
            RetrievalConfig {
                similarity_threshold: Some(0.7),
                collection: "kb".into(),
                ..RetrievalConfig::default()
            },
        );
        KnowledgeLookupTool::new(Arc::new(retriever))
    }

    #[tokio::test]
    async fn test_found_returns_context_and_citations() {
        let value = run(&tool(0.2).await, json!({"query": "naming rules"}), false).await;
        assert_eq!(value["context"].as_array().unwrap().len(), 2);
        assert_eq!(value["citations"], "style.md");
    }

    #[tokio::test]
    async fn test_nothing_relevant_is_envelope() {
        let value = run(&tool(0.9).await, json!({"query": "naming rules"}), true).await;
        assert_eq!(value["fatal_error"], true);
        assert_eq!(
            value["message"],
            "No such information found, this task will not be completed."
        );
    }

    #[tokio::test]
    async fn test_broken_store_is_service_error() {
        let retriever = Retriever::new(
            Arc::new(BrokenEmbedder),
            store_with("kb", &[]).await,
            RetrievalConfig {
                collection: "kb".into(),
                ..RetrievalConfig::default()
            },
        );
        let value = run(
            &KnowledgeLookupTool::new(Arc::new(retriever)),
            json!({"query": "x"}),
            true,
        )
        .await;
        assert!(value["message"]
            .as_str()
            .unwrap()
            .starts_with("Operation Failed."));
    }
}
