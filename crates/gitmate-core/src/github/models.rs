//! Response shapes of the GitHub REST endpoints the tools use

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

/// Login of an optional user, "unknown" for deleted accounts
pub fn login_of(user: &Option<User>) -> &str {
    user.as_ref().map(|u| u.login.as_str()).unwrap_or("unknown")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub default_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitTree {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub user: Option<User>,
    #[serde(default)]
    pub body: Option<String>,
    /// Present when the issue is actually a pull request
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub body: Option<String>,
    pub base: GitRef,
    pub head: GitRef,
    /// Only returned by the single-PR endpoint
    #[serde(default)]
    pub comments: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullFile {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub user: Option<User>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// `GET /contents/{path}` answers with an object for files and an array for directories
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    Dir(Vec<ContentEntry>),
    File(ContentEntry),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeSearchResponse {
    pub total_count: u64,
    pub items: Vec<CodeSearchItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearchItem {
    pub name: String,
    pub path: String,
    pub html_url: String,
}
