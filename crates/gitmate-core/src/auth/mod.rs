//! Delegated access tokens for the source-control host
//!
//! `CredentialManager` owns the single cached installation token of the
//! process and hands it to every tool call. `GitHubAppIssuer` performs the
//! App JWT -> installation token handshake.

pub mod github_app;
pub mod token_cache;

pub use github_app::{GitHubAppIssuer, Installation, InstallationSelector};
pub use token_cache::{AccessToken, CredentialManager, TokenIssuer};
