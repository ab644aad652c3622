//! Per-session context passed explicitly through every call boundary

use tracing::Span;

/// Identifies one conversation session for logging and per-user scoping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub user_id: String,
}

impl SessionContext {
    /// New session for `user_id` with a fresh session id
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Span carrying the correlation fields; enter it around session work
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            user_id = %self.user_id
        )
    }
}
