//! Pull request tools

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::github_failure;
use crate::github::models::login_of;
use crate::github::GitHubClient;
use crate::tools::path_utils::{language_hint, validate_repo_path};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

fn pr_number_schema() -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "description": "Pull request number"
    })
}

#[derive(Deserialize)]
struct PrNumberParams {
    pr_number: u64,
}

fn parse_pr_number(params: Value) -> Result<u64, ToolResult> {
    let params = parse_params::<PrNumberParams>(params)?;
    if params.pr_number == 0 {
        return Err(ToolResult::error(
            "Invalid parameters: pr_number must be a positive integer",
        ));
    }
    Ok(params.pr_number)
}

pub struct ListOpenPullRequestsTool {
    github: Arc<GitHubClient>,
}

impl ListOpenPullRequestsTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for ListOpenPullRequestsTool {
    fn name(&self) -> &str {
        "list_open_pull_requests"
    }

    fn description(&self) -> &str {
        "List all open pull requests of the repository as pr_number / pr_title pairs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        match self.github.list_open_pulls().await {
            Ok(pulls) => {
                let pulls: Vec<Value> = pulls
                    .iter()
                    .map(|pr| json!({"pr_number": pr.number, "pr_title": pr.title}))
                    .collect();
                ToolResult::success_data(json!({
                    "count": pulls.len(),
                    "pull_requests": pulls,
                }))
            }
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct GetPullRequestTool {
    github: Arc<GitHubClient>,
}

impl GetPullRequestTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for GetPullRequestTool {
    fn name(&self) -> &str {
        "get_pull_request"
    }

    fn description(&self) -> &str {
        "Get details of one pull request: number, title, state, author, creation date, base branch, head branch and description."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"pr_number": pr_number_schema()},
            "required": ["pr_number"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let number = match parse_pr_number(params) {
            Ok(n) => n,
            Err(e) => return e,
        };

        match self.github.get_pull(number).await {
            Ok(pr) => ToolResult::success_data(json!({
                "pr_number": pr.number,
                "pr_title": pr.title,
                "pr_state": pr.state,
                "pr_author": login_of(&pr.user),
                "pr_created_at": pr.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                "pr_base_branch": pr.base.ref_name,
                "pr_head_branch": pr.head.ref_name,
                "pr_body": pr.body,
            })),
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct ListPullRequestFilesTool {
    github: Arc<GitHubClient>,
}

impl ListPullRequestFilesTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for ListPullRequestFilesTool {
    fn name(&self) -> &str {
        "list_pull_request_files"
    }

    fn description(&self) -> &str {
        "List the files changed by a pull request with status (added, modified, removed), lines added, deleted and changed, and the diff patch."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"pr_number": pr_number_schema()},
            "required": ["pr_number"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let number = match parse_pr_number(params) {
            Ok(n) => n,
            Err(e) => return e,
        };

        match self.github.list_pull_files(number).await {
            Ok(files) => {
                let files: Vec<Value> = files
                    .iter()
                    .map(|f| {
                        json!({
                            "file_name": f.filename,
                            "file_status": f.status,
                            "lines_added": f.additions,
                            "lines_deleted": f.deletions,
                            "lines_changed": f.changes,
                            "patch": f.patch,
                        })
                    })
                    .collect();
                ToolResult::success_data(json!({
                    "pr_number": number,
                    "files": files,
                }))
            }
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct GetPullRequestFileTool {
    github: Arc<GitHubClient>,
}

impl GetPullRequestFileTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[derive(Deserialize)]
struct PrFileParams {
    pr_number: u64,
    filename: String,
}

#[async_trait]
impl Tool for GetPullRequestFileTool {
    fn name(&self) -> &str {
        "get_pull_request_file"
    }

    fn description(&self) -> &str {
        "Get the content of a file as it is in a pull request. Requires the pull request number and the file name with its full path from the repository root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pr_number": pr_number_schema(),
                "filename": {
                    "type": "string",
                    "description": "File path relative to the repository root, e.g. app/graph.py"
                }
            },
            "required": ["pr_number", "filename"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<PrFileParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if params.pr_number == 0 {
            return ToolResult::error("Invalid parameters: pr_number must be a positive integer");
        }
        let path = match validate_repo_path(&params.filename, false) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let pr = match self.github.get_pull(params.pr_number).await {
            Ok(pr) => pr,
            Err(e) => return github_failure(self.name(), e),
        };

        match self.github.get_file_text(&path, Some(&pr.head.sha)).await {
            Ok(content) => ToolResult::success_data(json!({
                "language": language_hint(&path),
                "content": content,
                "message": "Getting file content is successful.",
            })),
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct ListPullRequestAuthorsTool {
    github: Arc<GitHubClient>,
}

impl ListPullRequestAuthorsTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for ListPullRequestAuthorsTool {
    fn name(&self) -> &str {
        "list_pull_request_authors"
    }

    fn description(&self) -> &str {
        "List who created each open pull request: number, title and author."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        match self.github.list_open_pulls().await {
            Ok(pulls) => {
                let authors: Vec<Value> = pulls
                    .iter()
                    .map(|pr| {
                        json!({
                            "pr_number": pr.number,
                            "pr_title": pr.title,
                            "pr_author": login_of(&pr.user),
                        })
                    })
                    .collect();
                ToolResult::success_data(json!({ "pull_requests": authors }))
            }
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct ListPullRequestCommentsTool {
    github: Arc<GitHubClient>,
}

impl ListPullRequestCommentsTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for ListPullRequestCommentsTool {
    fn name(&self) -> &str {
        "list_pull_request_comments"
    }

    fn description(&self) -> &str {
        "List every comment on a pull request with its author, plus the pull request title and total comment count."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"pr_number": pr_number_schema()},
            "required": ["pr_number"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let number = match parse_pr_number(params) {
            Ok(n) => n,
            Err(e) => return e,
        };

        let pr = match self.github.get_pull(number).await {
            Ok(pr) => pr,
            Err(e) => return github_failure(self.name(), e),
        };
        let comments = match self.github.list_issue_comments(number).await {
            Ok(c) => c,
            Err(e) => return github_failure(self.name(), e),
        };

        let comments: Vec<Value> = comments
            .iter()
            .map(|c| {
                json!({
                    "commented_by": login_of(&c.user),
                    "comment_text": c.body.as_deref().unwrap_or_default(),
                })
            })
            .collect();

        ToolResult::success_data(json!({
            "pr_number": pr.number,
            "pr_title": pr.title,
            "total_comments": pr.comments.unwrap_or(comments.len() as u64),
            "comments": comments,
        }))
    }
}
