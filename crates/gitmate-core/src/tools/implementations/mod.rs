//! Tool implementations
//!
//! GitHub tools (need a `GitHubClient`):
//! - repository_overview, list_directory_files, get_file_content, search_code
//! - list_open_issues, comment_on_issue
//! - list_open_pull_requests, get_pull_request, list_pull_request_files,
//!   get_pull_request_file, list_pull_request_authors, list_pull_request_comments
//!
//! Other tools:
//! - search_videos: YouTube search (needs an API key)
//! - knowledge_lookup: retrieval pipeline over the local knowledge store

pub mod github_contents;
pub mod github_issues;
pub mod github_pulls;
pub mod knowledge;
pub mod youtube;

pub use github_contents::{
    GetFileContentTool, ListDirectoryFilesTool, RepositoryOverviewTool, SearchCodeTool,
};
pub use github_issues::{CommentOnIssueTool, ListOpenIssuesTool};
pub use github_pulls::{
    GetPullRequestFileTool, GetPullRequestTool, ListOpenPullRequestsTool,
    ListPullRequestAuthorsTool, ListPullRequestCommentsTool, ListPullRequestFilesTool,
};
pub use knowledge::KnowledgeLookupTool;
pub use youtube::SearchVideosTool;

use std::sync::Arc;

use crate::error::{GitHubError, RegistryError, ToolInvocationError};
use crate::github::GitHubClient;
use crate::index::Retriever;
use crate::tools::registry::{ToolRegistry, ToolResult};

/// Collaborators the built-in tools need; absent ones disable their tools
#[derive(Default, Clone)]
pub struct ToolServices {
    pub github: Option<Arc<GitHubClient>>,
    pub retriever: Option<Arc<Retriever>>,
    pub youtube_api_key: Option<String>,
}

/// Register every built-in tool whose collaborator is available
pub fn register_all_tools(
    registry: &mut ToolRegistry,
    services: &ToolServices,
) -> Result<(), RegistryError> {
    if let Some(github) = &services.github {
        register_github_tools(registry, github)?;
    }
    if let Some(key) = &services.youtube_api_key {
        registry.register(Arc::new(SearchVideosTool::new(key.clone())))?;
    }
    if let Some(retriever) = &services.retriever {
        registry.register(Arc::new(KnowledgeLookupTool::new(retriever.clone())))?;
    }
    Ok(())
}

/// Register the repository tools backed by one GitHub client
pub fn register_github_tools(
    registry: &mut ToolRegistry,
    github: &Arc<GitHubClient>,
) -> Result<(), RegistryError> {
    registry.register(Arc::new(RepositoryOverviewTool::new(github.clone())))?;
    registry.register(Arc::new(ListOpenIssuesTool::new(github.clone())))?;
    registry.register(Arc::new(CommentOnIssueTool::new(github.clone())))?;
    registry.register(Arc::new(ListOpenPullRequestsTool::new(github.clone())))?;
    registry.register(Arc::new(GetPullRequestTool::new(github.clone())))?;
    registry.register(Arc::new(ListPullRequestFilesTool::new(github.clone())))?;
    registry.register(Arc::new(GetPullRequestFileTool::new(github.clone())))?;
    registry.register(Arc::new(ListPullRequestAuthorsTool::new(github.clone())))?;
    registry.register(Arc::new(ListPullRequestCommentsTool::new(github.clone())))?;
    registry.register(Arc::new(ListDirectoryFilesTool::new(github.clone())))?;
    registry.register(Arc::new(GetFileContentTool::new(github.clone())))?;
    registry.register(Arc::new(SearchCodeTool::new(github.clone())))?;
    Ok(())
}

/// Envelope for a failed GitHub call
pub(crate) fn github_failure(tool: &str, err: GitHubError) -> ToolResult {
    tracing::warn!(tool, error = %err, "GitHub call failed");
    ToolResult::from_error(&ToolInvocationError::Service(format!(
        "Received error from GitHub: {}",
        err
    )))
}
