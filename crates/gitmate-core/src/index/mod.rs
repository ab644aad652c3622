//! Retrieval-augmented generation over a local knowledge store
//!
//! - `chunking` - overlapping word windows for ingestion
//! - `embeddings` - embedding provider trait, Ollama provider, vector math
//! - `store` - vector store trait and its SQLite implementation
//! - `retrieval` - query -> relevance-gated `ContextBundle`
//! - `answer` - retrieval-first answers with unaugmented fallback
//! - `ingest` - folder -> chunks -> embeddings -> store

pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod ingest;
pub mod retrieval;
pub mod store;

pub use answer::{KnowledgeAnswer, KnowledgeAssistant};
pub use chunking::{chunk_words, ChunkConfig};
pub use embeddings::{Embedder, OllamaEmbedder};
pub use ingest::{ingest_folder, IngestReport};
pub use retrieval::{ContextBundle, RetrievalConfig, Retriever};
pub use store::{NewChunk, ScoredChunk, SqliteVectorStore, VectorStore};
