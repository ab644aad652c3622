//! Authenticated GitHub REST client scoped to one repository

use std::sync::Arc;

use base64::Engine;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::models::{
    CodeSearchItem, CodeSearchResponse, ContentEntry, Contents, GitTree, Issue, IssueComment,
    PullFile, PullRequest, Repository, TreeEntry,
};
use crate::auth::CredentialManager;
use crate::constants;
use crate::error::GitHubError;

/// Upper bound on entries collected by a recursive directory walk
const MAX_WALK_ENTRIES: usize = 5_000;

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    repository: String,
    credentials: Arc<CredentialManager>,
    max_pages: usize,
}

impl GitHubClient {
    /// `repository` is the `owner/name` slug
    pub fn new(
        api_url: impl Into<String>,
        repository: impl Into<String>,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            repository: repository.into(),
            credentials,
            max_pages: constants::github::MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn repo_path(&self, suffix: &str) -> String {
        format!("/repos/{}{}", self.repository, suffix)
    }

    /// Send a request with the current token; on 401 drop that token and retry once
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, GitHubError> {
        let url = format!("{}{}", self.api_url, path);
        let mut retried = false;

        loop {
            let token = self.credentials.get_token().await?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", constants::github::API_VERSION)
                .header("User-Agent", constants::github::USER_AGENT)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, path, "GitHub request");
            let response = request.send().await?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                warn!(path, "GitHub rejected the access token, refreshing once");
                self.credentials.invalidate_if(&token).await;
                retried = true;
                continue;
            }

            return Self::check_status(response).await;
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);

        Err(GitHubError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GitHubError> {
        let response = self.send(Method::GET, path, query, None).await?;
        response
            .json()
            .await
            .map_err(|e| GitHubError::Decode(e.to_string()))
    }

    /// Follow `page` until a short page or the page cap
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GitHubError> {
        let per_page = constants::github::PER_PAGE;
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            let mut page_query = query.to_vec();
            page_query.push(("per_page", per_page.to_string()));
            page_query.push(("page", page.to_string()));

            let batch: Vec<T> = self.get_json(path, &page_query).await?;
            let len = batch.len();
            items.extend(batch);

            if len < per_page {
                return Ok(items);
            }
        }

        warn!(path, max_pages = self.max_pages, "Pagination stopped at page cap");
        Ok(items)
    }

    /// Every path on the default branch (recursive git tree)
    pub async fn default_branch_tree(&self) -> Result<Vec<TreeEntry>, GitHubError> {
        let repo: Repository = self.get_json(&self.repo_path(""), &[]).await?;
        let tree: GitTree = self
            .get_json(
                &self.repo_path(&format!("/git/trees/{}", repo.default_branch)),
                &[("recursive", "1".to_string())],
            )
            .await?;
        if tree.truncated {
            warn!("Repository tree listing was truncated by GitHub");
        }
        Ok(tree.tree)
    }

    /// Open issues, excluding pull requests
    pub async fn list_open_issues(&self) -> Result<Vec<Issue>, GitHubError> {
        let issues: Vec<Issue> = self
            .get_paginated(&self.repo_path("/issues"), &[("state", "open".to_string())])
            .await?;
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .collect())
    }

    pub async fn create_issue_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let payload = serde_json::json!({ "body": body });
        self.send(
            Method::POST,
            &self.repo_path(&format!("/issues/{}/comments", issue_number)),
            &[],
            Some(&payload),
        )
        .await?;
        Ok(())
    }

    pub async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, GitHubError> {
        self.get_paginated(&self.repo_path("/pulls"), &[("state", "open".to_string())])
            .await
    }

    pub async fn get_pull(&self, number: u64) -> Result<PullRequest, GitHubError> {
        self.get_json(&self.repo_path(&format!("/pulls/{}", number)), &[])
            .await
    }

    pub async fn list_pull_files(&self, number: u64) -> Result<Vec<PullFile>, GitHubError> {
        self.get_paginated(&self.repo_path(&format!("/pulls/{}/files", number)), &[])
            .await
    }

    /// Conversation comments of an issue or pull request
    pub async fn list_issue_comments(&self, number: u64) -> Result<Vec<IssueComment>, GitHubError> {
        self.get_paginated(&self.repo_path(&format!("/issues/{}/comments", number)), &[])
            .await
    }

    pub async fn get_contents(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Contents, GitHubError> {
        let query: Vec<(&str, String)> = git_ref.map(|r| ("ref", r.to_string())).into_iter().collect();
        self.get_json(&self.repo_path(&format!("/contents/{}", path)), &query)
            .await
    }

    /// Decoded UTF-8 text of a file
    pub async fn get_file_text(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, GitHubError> {
        match self.get_contents(path, git_ref).await? {
            Contents::File(entry) => decode_file_content(&entry),
            Contents::Dir(_) => Err(GitHubError::Decode(format!(
                "'{}' is a directory, not a file",
                path
            ))),
        }
    }

    /// All file paths under `path`, walking sub-directories
    pub async fn list_directory_recursive(&self, path: &str) -> Result<Vec<String>, GitHubError> {
        let mut files = Vec::new();
        let mut pending = vec![path.to_string()];

        while let Some(dir) = pending.pop() {
            let entries = match self.get_contents(&dir, None).await? {
                Contents::Dir(entries) => entries,
                Contents::File(entry) => vec![entry],
            };

            for entry in entries {
                match entry.kind.as_str() {
                    "file" => files.push(entry.path),
                    "dir" => pending.push(entry.path),
                    _ => {}
                }
            }

            if files.len() >= MAX_WALK_ENTRIES {
                warn!(path, "Directory walk stopped at {} files", MAX_WALK_ENTRIES);
                files.truncate(MAX_WALK_ENTRIES);
                break;
            }
        }

        files.sort();
        Ok(files)
    }

    /// Code search scoped to the repository
    pub async fn search_code(&self, query: &str) -> Result<Vec<CodeSearchItem>, GitHubError> {
        let q = format!("{} repo:{}", query, self.repository);
        let response: CodeSearchResponse = self
            .get_json(
                "/search/code",
                &[("q", q), ("per_page", constants::github::PER_PAGE.to_string())],
            )
            .await?;
        debug!(total = response.total_count, "Code search finished");
        Ok(response.items)
    }
}

fn decode_file_content(entry: &ContentEntry) -> Result<String, GitHubError> {
    let content = entry.content.as_deref().unwrap_or_default();
    match entry.encoding.as_deref() {
        Some("base64") => {
            let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .map_err(|e| GitHubError::Decode(format!("invalid base64 content: {}", e)))?;
            String::from_utf8(bytes)
                .map_err(|_| GitHubError::Decode(format!("'{}' is not a UTF-8 text file", entry.path)))
        }
        Some("none") => Err(GitHubError::Decode(format!(
            "'{}' is too large to fetch through the contents API",
            entry.path
        ))),
        _ => Ok(content.to_string()),
    }
}
