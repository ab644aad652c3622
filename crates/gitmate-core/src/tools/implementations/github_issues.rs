//! Issue tools: list open issues, comment on an issue

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::github_failure;
use crate::github::models::login_of;
use crate::github::GitHubClient;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct ListOpenIssuesTool {
    github: Arc<GitHubClient>,
}

impl ListOpenIssuesTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for ListOpenIssuesTool {
    fn name(&self) -> &str {
        "list_open_issues"
    }

    fn description(&self) -> &str {
        "List the open issues of the repository (pull requests excluded). Returns number, title, author and state for each issue."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        match self.github.list_open_issues().await {
            Ok(issues) => {
                let issues: Vec<Value> = issues
                    .iter()
                    .map(|i| {
                        json!({
                            "issue_number": i.number,
                            "title": i.title,
                            "author": login_of(&i.user),
                            "state": i.state,
                        })
                    })
                    .collect();
                ToolResult::success_data(json!({
                    "count": issues.len(),
                    "issues": issues,
                }))
            }
            Err(e) => github_failure(self.name(), e),
        }
    }
}

pub struct CommentOnIssueTool {
    github: Arc<GitHubClient>,
}

impl CommentOnIssueTool {
    pub fn new(github: Arc<GitHubClient>) -> Self {
        Self { github }
    }
}

#[derive(Deserialize)]
struct CommentParams {
    issue_number: i64,
    comment: String,
}

#[async_trait]
impl Tool for CommentOnIssueTool {
    fn name(&self) -> &str {
        "comment_on_issue"
    }

    fn description(&self) -> &str {
        "Add a comment to an issue in the repository. Requires the issue number and the comment text; ask the user for them if they are not known."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_number": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Number of the issue to comment on"
                },
                "comment": {
                    "type": "string",
                    "description": "Comment text (markdown allowed)"
                }
            },
            "required": ["issue_number", "comment"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<CommentParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        // Preconditions guard the only write this tool performs
        let issue_number = match u64::try_from(params.issue_number) {
            Ok(n) if n >= 1 => n,
            _ => {
                return ToolResult::error(format!(
                    "Invalid parameters: issue_number must be a positive integer, got {}",
                    params.issue_number
                ))
            }
        };
        let comment = params.comment.trim();
        if comment.is_empty() {
            return ToolResult::error("Invalid parameters: comment must not be empty");
        }

        tracing::info!(issue_number, "Adding comment to issue");
        match self.github.create_issue_comment(issue_number, comment).await {
            Ok(()) => ToolResult::success_data(json!({
                "message": format!("Operation Successful, adding comment on issue#{} succeeded", issue_number),
                "issue_number": issue_number,
            })),
            Err(e) => github_failure(self.name(), e),
        }
    }
}
