//! Query -> relevance-gated context bundle

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::embeddings::{Embedder, OllamaEmbedder};
use super::store::{ScoredChunk, SqliteVectorStore, VectorStore};
use crate::config::RagSettings;
use crate::constants;
use crate::error::RetrievalError;

/// Per-deployment retrieval policy
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Nearest neighbours requested from the store
    pub top_k: usize,
    /// Maximum cosine distance a chunk may have to be cited.
    /// `None` disables the gate: every candidate is kept.
    pub similarity_threshold: Option<f32>,
    pub collection: String,
    /// Bound on embedding + store query together
    pub timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: constants::rag::TOP_K,
            similarity_threshold: None,
            collection: constants::rag::COLLECTION.to_string(),
            timeout: Duration::from_secs(constants::rag::QUERY_TIMEOUT_SECS),
        }
    }
}

/// Context retrieved for one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
    /// Chunk texts, nearest first
    pub chunks: Vec<String>,
    /// Source of each chunk, same order (duplicates allowed)
    pub sources: Vec<String>,
    pub found: bool,
}

impl ContextBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_chunks(chunks: Vec<ScoredChunk>) -> Self {
        let found = !chunks.is_empty();
        let (chunks, sources) = chunks.into_iter().map(|c| (c.text, c.source)).unzip();
        Self {
            chunks,
            sources,
            found,
        }
    }

    /// Deduplicated sources in first-seen order, joined for display
    pub fn citation_text(&self) -> String {
        let mut seen: Vec<&str> = Vec::new();
        for source in &self.sources {
            if !seen.contains(&source.as_str()) {
                seen.push(source);
            }
        }
        seen.join(", ")
    }

    /// Chunk texts joined as a single context block
    pub fn context_text(&self) -> String {
        self.chunks.join("\n\n")
    }
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Build the production retriever (Ollama embeddings + SQLite store).
    ///
    /// Fails with a distinct kind when the store path or the embedding
    /// model is not configured.
    pub fn from_settings(settings: &RagSettings) -> Result<Self, RetrievalError> {
        let db_path = settings
            .db_path
            .as_ref()
            .ok_or(RetrievalError::MissingStoreConfig)?;
        let model = settings
            .embedding_model
            .as_ref()
            .ok_or(RetrievalError::MissingEmbeddingModel)?;

        let store = SqliteVectorStore::open_existing(db_path)?;
        let embedder = OllamaEmbedder::new(&settings.ollama_url, model);

        Ok(Self::new(
            Arc::new(embedder),
            Arc::new(store),
            RetrievalConfig {
                top_k: settings.top_k,
                similarity_threshold: settings.similarity_threshold,
                collection: settings.collection.clone(),
                ..RetrievalConfig::default()
            },
        ))
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Embed the query, fetch the top-K neighbours and apply the relevance gate.
    ///
    /// An empty bundle means "nothing relevant"; an error means the
    /// subsystem could not answer.
    pub async fn retrieve(
        &self,
        query: &str,
        conversation_context: Option<&str>,
    ) -> Result<ContextBundle, RetrievalError> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.retrieve_inner(query, conversation_context))
            .await
            .map_err(|_| RetrievalError::Timeout(timeout))?
    }

    async fn retrieve_inner(
        &self,
        query: &str,
        conversation_context: Option<&str>,
    ) -> Result<ContextBundle, RetrievalError> {
        let text = match conversation_context.map(str::trim) {
            Some(context) if !context.is_empty() => format!("{}\n{}", context, query),
            _ => query.to_string(),
        };

        let collection = &self.config.collection;
        match self.store.collection_model(collection).await? {
            None => return Err(RetrievalError::MissingCollection(collection.clone())),
            Some(stored) if stored != self.embedder.model() => {
                return Err(RetrievalError::ModelMismatch {
                    collection: collection.clone(),
                    expected: stored,
                    actual: self.embedder.model().to_string(),
                })
            }
            Some(_) => {}
        }

        let embedding = self.embedder.embed_one(&text).await?;
        let candidates = self
            .store
            .query(&self.config.collection, &embedding, self.config.top_k)
            .await?;
        let total = candidates.len();

        let kept: Vec<ScoredChunk> = match self.config.similarity_threshold {
            Some(threshold) => candidates
                .into_iter()
                .filter(|c| {
                    let keep = c.distance <= threshold;
                    if !keep {
                        debug!(chunk = %c.id, distance = c.distance, threshold, "Chunk gated out");
                    }
                    keep
                })
                .collect(),
            None => candidates,
        };

        info!(
            collection = %self.config.collection,
            candidates = total,
            kept = kept.len(),
            "Retrieval finished"
        );
        Ok(ContextBundle::from_chunks(kept))
    }
}
