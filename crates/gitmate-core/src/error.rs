//! Error taxonomy
//!
//! - `CredentialError` - token issuance/refresh failed; tools surface it as an envelope
//! - `ToolInvocationError` - bad arguments or a failing external service; always an envelope
//! - `RetrievalError` - retrieval subsystem broken (distinct from "nothing relevant")
//! - `ModelInvocationError` - backend unreachable or rejected the request; ends the turn
//! - `KnowledgeError` - a knowledge answer could not be produced
//! - `GitHubError` - source-control host call failed; tools surface it as an envelope
//! - `HistoryError` / `ConfigError` - persistence and configuration at the process edge
//! - `AgentError` - what a turn reports to its caller

use std::time::Duration;

use thiserror::Error;

/// Failure to issue or refresh the delegated access token.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("invalid app signing key: {0}")]
    InvalidKey(String),
    #[error("identity provider unreachable: {0}")]
    Network(String),
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("no installation found for this app")]
    NoInstallation,
    #[error("no installation matches {0}")]
    InstallationNotFound(String),
    #[error("malformed identity provider response: {0}")]
    Malformed(String),
    #[error("token refresh timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure inside a single tool call.
///
/// Never escapes the dispatcher: it is rendered into the
/// `{"fatal_error": true, "message": ...}` envelope and fed back to the model.
#[derive(Debug, Error)]
pub enum ToolInvocationError {
    #[error("Invalid parameters: {0}")]
    InvalidArguments(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool '{tool}' timed out after {} seconds", .timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },
    #[error("Operation Failed. {0}")]
    Service(String),
}

/// Transport-level failure inside the GitHub client.
///
/// Tools translate it into the error envelope.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("GitHub request failed: {0}")]
    Http(String),
    #[error("GitHub returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected GitHub response: {0}")]
    Decode(String),
}

impl GitHubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GitHubError::Decode(err.to_string())
        } else {
            GitHubError::Http(err.to_string())
        }
    }
}

/// Failure of the embedding provider.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Retrieval subsystem failure. An empty `ContextBundle` is not an error.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("knowledge store is not configured")]
    MissingStoreConfig,
    #[error("embedding model is not configured")]
    MissingEmbeddingModel,
    #[error("collection '{0}' not found")]
    MissingCollection(String),
    #[error("collection '{collection}' was built with embedding model '{expected}', not '{actual}'")]
    ModelMismatch {
        collection: String,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("knowledge store error: {0}")]
    Store(String),
    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),
}

impl From<rusqlite::Error> for RetrievalError {
    fn from(err: rusqlite::Error) -> Self {
        RetrievalError::Store(err.to_string())
    }
}

/// Failure of the backing language model call.
#[derive(Debug, Clone, Error)]
pub enum ModelInvocationError {
    #[error("model backend unreachable: {0}")]
    Unreachable(String),
    #[error("model backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of a retrieval-first knowledge answer.
#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Model(#[from] ModelInvocationError),
}

/// Reading or writing a persisted conversation failed.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid user id '{0}'")]
    InvalidUserId(String),
    #[error("history file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed history file {path}: {message}")]
    Malformed { path: String, message: String },
}

/// Process configuration is missing or invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error("cannot read private key file {path}: {message}")]
    KeyFile { path: String, message: String },
}

/// Tool registration rejects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid tool name '{0}': names must be non-empty and contain no whitespace")]
    InvalidName(String),
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),
    #[error("tool '{name}' declares an invalid parameter schema: {message}")]
    InvalidSchema { name: String, message: String },
}

/// What a turn of the orchestration loop reports upward.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelInvocationError),
    #[error("conversation invariant violated: {0}")]
    Invariant(String),
}

impl AgentError {
    /// Short text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Model(ModelInvocationError::Timeout(_)) => {
                "The assistant took too long to respond. Please try again.".to_string()
            }
            AgentError::Model(_) => {
                "The assistant is unavailable right now. Please try again later.".to_string()
            }
            AgentError::Invariant(_) => {
                "Something went wrong while processing this request.".to_string()
            }
        }
    }
}
