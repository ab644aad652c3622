//! Cached installation token with single-flight refresh

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants;
use crate::error::CredentialError;

/// Performs one full issuance handshake with the identity provider
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self) -> Result<String, CredentialError>;
}

/// Token value plus the instant it was issued
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    issued_at: Instant,
}

impl AccessToken {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.issued_at.elapsed() >= ttl
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Hands out always-valid delegated access tokens.
///
/// The lock is held across the expiry check and the refresh, so callers
/// that observe an expired token queue behind the one in-flight issuance
/// and then read its result.
pub struct CredentialManager {
    issuer: Arc<dyn TokenIssuer>,
    ttl: Duration,
    refresh_timeout: Duration,
    cached: Mutex<Option<AccessToken>>,
}

impl CredentialManager {
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self::with_ttl(
            issuer,
            Duration::from_secs(constants::github::TOKEN_TTL_SECS),
        )
    }

    pub fn with_ttl(issuer: Arc<dyn TokenIssuer>, ttl: Duration) -> Self {
        Self {
            issuer,
            ttl,
            refresh_timeout: Duration::from_secs(constants::github::TOKEN_REFRESH_TIMEOUT_SECS),
            cached: Mutex::new(None),
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current token, refreshing first if it is missing or expired
    pub async fn get_token(&self) -> Result<String, CredentialError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired(self.ttl) {
                return Ok(token.value.clone());
            }
            debug!("Access token expired, refreshing");
        }

        // Never leave an expired token behind if the refresh fails
        *cached = None;

        let value = tokio::time::timeout(self.refresh_timeout, self.issuer.issue())
            .await
            .map_err(|_| {
                warn!("Token refresh timed out after {:?}", self.refresh_timeout);
                CredentialError::Timeout(self.refresh_timeout)
            })??;

        *cached = Some(AccessToken {
            value: value.clone(),
            issued_at: Instant::now(),
        });
        info!("Issued new installation access token");

        Ok(value)
    }

    /// Drop the cached token so the next request performs a fresh handshake
    pub async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            debug!("Access token invalidated");
        }
    }

    /// Drop the cached token only if it is still `rejected`.
    ///
    /// A caller holding a stale token must not discard one that another
    /// caller has already refreshed. Returns whether a token was dropped.
    pub async fn invalidate_if(&self, rejected: &str) -> bool {
        let mut cached = self.cached.lock().await;
        match cached.as_ref() {
            Some(token) if token.value == rejected => {
                *cached = None;
                debug!("Rejected access token invalidated");
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the cached token, if any
    pub async fn current(&self) -> Option<AccessToken> {
        self.cached.lock().await.clone()
    }
}
