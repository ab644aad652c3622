//! GitHub App installation token issuance
//!
//! Handshake: sign a short-lived RS256 JWT as the App, list the App's
//! installations, pick one, and exchange it for an installation token.

use std::fmt;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::token_cache::TokenIssuer;
use crate::constants;
use crate::error::CredentialError;

/// Backdate `iat` to tolerate clock drift
const JWT_BACKDATE_SECS: i64 = 60;
/// GitHub rejects App JWTs living longer than ten minutes
const JWT_LIFETIME_SECS: i64 = 9 * 60;

/// Which installation of the App to act as
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstallationSelector {
    /// First installation returned by the API
    #[default]
    First,
    Id(u64),
    /// Installation whose account login matches (case-insensitive)
    Account(String),
}

impl fmt::Display for InstallationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallationSelector::First => write!(f, "first installation"),
            InstallationSelector::Id(id) => write!(f, "installation id {}", id),
            InstallationSelector::Account(login) => write!(f, "account '{}'", login),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationAccount {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    pub id: u64,
    #[serde(default)]
    pub account: Option<InstallationAccount>,
}

impl InstallationSelector {
    pub fn select<'a>(
        &self,
        installations: &'a [Installation],
    ) -> Result<&'a Installation, CredentialError> {
        if installations.is_empty() {
            return Err(CredentialError::NoInstallation);
        }

        match self {
            InstallationSelector::First => {
                if installations.len() > 1 {
                    warn!(
                        count = installations.len(),
                        "App has several installations, using the first one"
                    );
                }
                Ok(&installations[0])
            }
            InstallationSelector::Id(id) => installations
                .iter()
                .find(|i| i.id == *id)
                .ok_or_else(|| CredentialError::InstallationNotFound(self.to_string())),
            InstallationSelector::Account(login) => installations
                .iter()
                .find(|i| {
                    i.account
                        .as_ref()
                        .is_some_and(|a| a.login.eq_ignore_ascii_case(login))
                })
                .ok_or_else(|| CredentialError::InstallationNotFound(self.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct InstallationTokenResponse {
    token: String,
}

/// Production `TokenIssuer` for a GitHub App
pub struct GitHubAppIssuer {
    http: reqwest::Client,
    api_url: String,
    app_id: String,
    key: EncodingKey,
    selector: InstallationSelector,
}

impl GitHubAppIssuer {
    /// `private_key_pem` is the App's RSA private key in PEM form
    pub fn new(
        api_url: impl Into<String>,
        app_id: impl Into<String>,
        private_key_pem: &str,
        selector: InstallationSelector,
    ) -> Result<Self, CredentialError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            key,
            selector,
        })
    }

    /// Short-lived JWT authenticating as the App itself
    pub fn app_jwt(&self) -> Result<String, CredentialError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AppClaims {
            iat: now - JWT_BACKDATE_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: self.app_id.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))
    }

    fn request(&self, method: reqwest::Method, path: &str, jwt: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", constants::github::API_VERSION)
            .header("User-Agent", constants::github::USER_AGENT)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, CredentialError> {
        let response = request
            .send()
            .await
            .map_err(|e| CredentialError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or(body);
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CredentialError::Malformed(e.to_string()))
    }

    pub async fn list_installations(&self, jwt: &str) -> Result<Vec<Installation>, CredentialError> {
        let json = self
            .send(self.request(reqwest::Method::GET, "/app/installations", jwt))
            .await?;
        serde_json::from_value(json).map_err(|e| CredentialError::Malformed(e.to_string()))
    }

    async fn create_installation_token(
        &self,
        jwt: &str,
        installation_id: u64,
    ) -> Result<String, CredentialError> {
        let path = format!("/app/installations/{}/access_tokens", installation_id);
        let json = self
            .send(self.request(reqwest::Method::POST, &path, jwt))
            .await?;
        let response: InstallationTokenResponse =
            serde_json::from_value(json).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        Ok(response.token)
    }
}

#[async_trait]
impl TokenIssuer for GitHubAppIssuer {
    async fn issue(&self) -> Result<String, CredentialError> {
        let jwt = self.app_jwt()?;
        let installations = self.list_installations(&jwt).await?;
        let installation = self.selector.select(&installations)?;
        debug!(installation_id = installation.id, "Requesting installation token");
        self.create_installation_token(&jwt, installation.id).await
    }
}
