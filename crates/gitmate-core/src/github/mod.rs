//! Source-control host (GitHub REST API) client used by the GitHub tools

pub mod client;
pub mod models;

pub use client::GitHubClient;
pub use models::{
    CodeSearchItem, ContentEntry, Contents, Issue, IssueComment, PullFile, PullRequest,
    TreeEntry,
};
