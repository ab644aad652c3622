//! GitMate core library
//!
//! Everything except the terminal front-end lives here:
//! - `agent` - the orchestration state machine (model turn / tool dispatch)
//! - `auth` - delegated GitHub App token lifecycle
//! - `tools` - tool registry, dispatcher and the built-in tools
//! - `github` - HTTP client for the source-control host
//! - `index` - retrieval pipeline, embeddings, knowledge store, ingestion
//! - `ai` - model backend boundary and the OpenAI-compatible client
//! - `storage` - persisted conversation history
//! - `config` - environment-driven configuration

pub mod agent;
pub mod ai;
pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod github;
pub mod index;
pub mod paths;
pub mod storage;
pub mod tools;

pub use agent::{AgentOrchestrator, OrchestratorConfig, SessionContext, TurnOutcome};
pub use ai::types::{Conversation, Message, ToolCall};
pub use auth::CredentialManager;
pub use config::AppConfig;
pub use error::{
    AgentError, CredentialError, KnowledgeError, ModelInvocationError, RetrievalError,
    ToolInvocationError,
};
pub use index::{ContextBundle, Retriever};
pub use tools::ToolRegistry;
