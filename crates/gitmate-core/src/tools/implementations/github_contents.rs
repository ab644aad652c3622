//! Repository content tools: tree overview, directory walk, file content, code search

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::github_failure;
use crate::github::GitHubClient;
use crate::tools::path_utils::{language_hint, validate_repo_path};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct RepositoryOverviewTool {
    github: Arc<GitHubClient>,
}

impl RepositoryOverviewTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for RepositoryOverviewTool {
    fn name(&self) -> &str {
        "repository_overview"
    }

    fn description(&self) -> &str {
        "Overview of the repository: every file path on the default branch. Use it to find where things live before reading files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        match self.github.default_branch_tree().await {
            Ok(entries) => {
                let files: Vec<&str> = entries
                    .iter()
                    .filter(|e| e.kind == "blob")
                    .map(|e| e.path.as_str())
                    .collect();
                ToolResult::success_data(json!({
                    "repository": self.github.repository(),
                    "files": files,
                }))
            }
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct ListDirectoryFilesTool {
    github: Arc<GitHubClient>,
}

impl ListDirectoryFilesTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[derive(Deserialize)]
struct DirectoryParams {
    directory_path: String,
}

#[async_trait]
impl Tool for ListDirectoryFilesTool {
    fn name(&self) -> &str {
        "list_directory_files"
    }

    fn description(&self) -> &str {
        "List the files in a repository directory recursively, e.g. \"src\" or \"data/subdir\". Use \"\" for the repository root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory_path": {
                    "type": "string",
                    "description": "Directory path relative to the repository root"
                }
            },
            "required": ["directory_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<DirectoryParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let path = match validate_repo_path(&params.directory_path, true) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match self.github.list_directory_recursive(&path).await {
            Ok(files) => ToolResult::success_data(json!({
                "directory": path,
                "files": files,
            })),
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct GetFileContentTool {
    github: Arc<GitHubClient>,
}

impl GetFileContentTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[derive(Deserialize)]
struct FileParams {
    file_path: String,
}

#[async_trait]
impl Tool for GetFileContentTool {
    fn name(&self) -> &str {
        "get_file_content"
    }

    fn description(&self) -> &str {
        "Get the content of a file on the default branch, e.g. \"sample.txt\" or \"data/subdir/sample.txt\". Returns the content and a language hint."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                }
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<FileParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let path = match validate_repo_path(&params.file_path, false) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match self.github.get_file_text(&path, None).await {
            Ok(content) => ToolResult::success_data(json!({
                "language": language_hint(&path),
                "content": content,
                "message": "Getting file content is successful.",
            })),
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct SearchCodeTool {
    github: Arc<GitHubClient>,
}

impl SearchCodeTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Search the repository's code for a keyword or symbol. Returns matching file names, paths and links."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search terms (GitHub code search syntax)"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<SearchParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let query = params.query.trim();
        if query.is_empty() {
            return ToolResult::error("Invalid parameters: query must not be empty");
        }

        match self.github.search_code(query).await {
            Ok(items) => ToolResult::success_data(json!({
                "query": query,
                "results": items,
            })),
            Err(e) => github_failure(self.name(), e),
        }
    }
}
