//! Process configuration read from environment variables
//!
//! `AppConfig::from_env()` is called once at startup; tests use
//! `from_lookup` with a map instead of the real environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ai::client::AiClientConfig;
use crate::ai::providers::ProviderId;
use crate::auth::InstallationSelector;
use crate::constants;
use crate::error::ConfigError;
use crate::paths;

/// GitHub App identity and target repository
#[derive(Clone)]
pub struct GitHubSettings {
    pub app_id: String,
    pub private_key_pem: String,
    /// `owner/name`
    pub repository: String,
    pub api_url: String,
    pub installation: InstallationSelector,
    pub token_ttl: Duration,
}

impl std::fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("app_id", &self.app_id)
            .field("private_key_pem", &"<redacted>")
            .field("repository", &self.repository)
            .field("api_url", &self.api_url)
            .field("installation", &self.installation)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: ProviderId,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl LlmSettings {
    pub fn client_config(&self) -> AiClientConfig {
        let mut config = AiClientConfig::new(self.provider, self.model.clone());
        config.base_url = self.base_url.clone();
        config.api_key = self.api_key.clone();
        config.request_timeout = self.timeout;
        config
    }
}

/// Knowledge store settings; missing path or model leaves retrieval unconfigured
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub db_path: Option<PathBuf>,
    pub collection: String,
    pub embedding_model: Option<String>,
    pub ollama_url: String,
    pub top_k: usize,
    /// Maximum cosine distance; `None` disables the relevance gate
    pub similarity_threshold: Option<f32>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            db_path: None,
            collection: constants::rag::COLLECTION.to_string(),
            embedding_model: None,
            ollama_url: constants::rag::OLLAMA_URL.to_string(),
            top_k: constants::rag::TOP_K,
            similarity_threshold: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` when no GitHub App is configured; the GitHub tools are then disabled
    pub github: Option<GitHubSettings>,
    pub llm: LlmSettings,
    pub rag: RagSettings,
    pub youtube_api_key: Option<String>,
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    pub history_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// Typed access to a string lookup (the environment, or a map in tests)
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty, trimmed value
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                    name,
                    message: format!("'{}': {}", raw, e),
                })
            })
            .transpose()
    }

    fn positive(&self, name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match self.parse::<u64>(name)? {
            Some(0) => Err(ConfigError::Invalid {
                name,
                message: "must be greater than zero".to_string(),
            }),
            Some(value) => Ok(value),
            None => Ok(default),
        }
    }
}

/// PEM text as-is, anything else is read as a path to a PEM file
fn resolve_private_key(raw: &str) -> Result<String, ConfigError> {
    if raw.contains("-----BEGIN") {
        // single-line env values often carry escaped newlines
        return Ok(raw.replace("\\n", "\n"));
    }
    std::fs::read_to_string(raw).map_err(|e| ConfigError::KeyFile {
        path: raw.to_string(),
        message: e.to_string(),
    })
}

fn github_settings<F>(vars: &Vars<F>) -> Result<Option<GitHubSettings>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let any_set = ["GITHUB_APP_ID", "GITHUB_APP_PRIVATE_KEY", "GITHUB_REPOSITORY"]
        .iter()
        .any(|name| vars.get(name).is_some());
    if !any_set {
        return Ok(None);
    }

    let app_id = vars.require("GITHUB_APP_ID")?;
    let private_key_pem = resolve_private_key(&vars.require("GITHUB_APP_PRIVATE_KEY")?)?;
    let repository = vars.require("GITHUB_REPOSITORY")?;

    let valid_slug = matches!(
        repository.split_once('/'),
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/')
    );
    if !valid_slug {
        return Err(ConfigError::Invalid {
            name: "GITHUB_REPOSITORY",
            message: format!("'{}' is not of the form owner/name", repository),
        });
    }

    let installation = match (
        vars.parse::<u64>("GITHUB_INSTALLATION_ID")?,
        vars.get("GITHUB_INSTALLATION_ACCOUNT"),
    ) {
        (Some(id), _) => InstallationSelector::Id(id),
        (None, Some(account)) => InstallationSelector::Account(account),
        (None, None) => InstallationSelector::First,
    };

    Ok(Some(GitHubSettings {
        app_id,
        private_key_pem,
        repository,
        api_url: vars
            .get("GITHUB_API_URL")
            .unwrap_or_else(|| constants::github::API_URL.to_string()),
        installation,
        token_ttl: Duration::from_secs(
            vars.positive("GITHUB_TOKEN_TTL_SECS", constants::github::TOKEN_TTL_SECS)?,
        ),
    }))
}

fn llm_settings<F>(vars: &Vars<F>) -> Result<LlmSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider = match vars.get("LLM_PROVIDER") {
        Some(raw) => raw.parse::<ProviderId>().map_err(|message| ConfigError::Invalid {
            name: "LLM_PROVIDER",
            message,
        })?,
        None => ProviderId::default(),
    };

    let api_key = vars.get("OPENAI_API_KEY");
    if provider.requires_api_key() && api_key.is_none() {
        return Err(ConfigError::Missing("OPENAI_API_KEY"));
    }

    Ok(LlmSettings {
        provider,
        model: vars.require("LLM_MODEL_ID")?,
        base_url: vars.get("LLM_BASE_URL"),
        api_key,
        timeout: Duration::from_secs(
            vars.positive("LLM_TIMEOUT_SECS", constants::ai::REQUEST_TIMEOUT_SECS)?,
        ),
    })
}

fn rag_settings<F>(vars: &Vars<F>) -> Result<RagSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RagSettings::default();

    let similarity_threshold = vars.parse::<f32>("RAG_SIMILARITY_THRESHOLD")?;
    if let Some(threshold) = similarity_threshold {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid {
                name: "RAG_SIMILARITY_THRESHOLD",
                message: format!("{} is not a non-negative distance", threshold),
            });
        }
    }

    Ok(RagSettings {
        db_path: vars.get("KNOWLEDGE_DB_PATH").map(PathBuf::from),
        collection: vars.get("RAG_COLLECTION").unwrap_or(defaults.collection),
        embedding_model: vars.get("RAG_EMBEDDING_MODEL"),
        ollama_url: vars.get("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_url),
        top_k: vars.positive("RAG_TOP_K", defaults.top_k as u64)? as usize,
        similarity_threshold,
    })
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        Ok(Self {
            github: github_settings(&vars)?,
            llm: llm_settings(&vars)?,
            rag: rag_settings(&vars)?,
            youtube_api_key: vars.get("YOUTUBE_API_KEY"),
            max_iterations: vars
                .positive("AGENT_MAX_ITERATIONS", constants::agent::MAX_ITERATIONS as u64)?
                as usize,
            tool_timeout: Duration::from_secs(
                vars.positive("TOOL_TIMEOUT_SECS", constants::agent::TOOL_TIMEOUT_SECS)?,
            ),
            history_dir: vars
                .get("HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(paths::history_dir),
            log_dir: vars
                .get("LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(paths::logs_dir),
        })
    }

    /// Whether both a store path and an embedding model are set
    pub fn retrieval_configured(&self) -> bool {
        self.rag.db_path.is_some() && self.rag.embedding_model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TEST_KEY: &str = include_str!("../tests/fixtures/test_app_key.pem");

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |name| map.get(name).cloned())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = config(&[("LLM_MODEL_ID", "llama3.2")]).unwrap();

        assert!(config.github.is_none());
        assert_eq!(config.llm.provider, ProviderId::Ollama);
        assert_eq!(config.llm.timeout, Duration::from_secs(120));
        assert_eq!(config.rag.collection, "kb_collection");
        assert_eq!(config.rag.top_k, 2);
        assert_eq!(config.rag.similarity_threshold, None);
        assert!(!config.retrieval_configured());
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.tool_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_model_is_required() {
        assert!(matches!(
            config(&[]),
            Err(ConfigError::Missing("LLM_MODEL_ID"))
        ));
    }

    #[test]
    fn test_openai_needs_key() {
        assert!(matches!(
            config(&[("LLM_PROVIDER", "openai"), ("LLM_MODEL_ID", "gpt-4o-mini")]),
            Err(ConfigError::Missing("OPENAI_API_KEY"))
        ));
        let ok = config(&[
            ("LLM_PROVIDER", "openai"),
            ("LLM_MODEL_ID", "gpt-4o-mini"),
            ("OPENAI_API_KEY", "sk-x"),
        ])
        .unwrap();
        assert_eq!(ok.llm.client_config().api_url(), constants::ai::OPENAI_URL);
    }

    #[test]
    fn test_github_settings() {
        let escaped = TEST_KEY.replace('\n', "\\n");
        let config = config(&[
            ("LLM_MODEL_ID", "m"),
            ("GITHUB_APP_ID", "123"),
            ("GITHUB_APP_PRIVATE_KEY", &escaped),
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_INSTALLATION_ACCOUNT", "acme"),
        ])
        .unwrap();

        let github = config.github.unwrap();
        assert_eq!(github.private_key_pem, TEST_KEY);
        assert_eq!(github.installation, InstallationSelector::Account("acme".into()));
        assert_eq!(github.token_ttl, Duration::from_secs(3000));
        assert!(!format!("{github:?}").contains("BEGIN"));
    }

    #[test]
    fn test_private_key_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("app.pem");
        std::fs::write(&key_path, TEST_KEY).unwrap();
        let key_path = key_path.to_string_lossy().to_string();

        let config = config(&[
            ("LLM_MODEL_ID", "m"),
            ("GITHUB_APP_ID", "123"),
            ("GITHUB_APP_PRIVATE_KEY", &key_path),
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_INSTALLATION_ID", "99"),
        ])
        .unwrap();
        let github = config.github.unwrap();
        assert_eq!(github.private_key_pem, TEST_KEY);
        assert_eq!(github.installation, InstallationSelector::Id(99));
    }

    #[test]
    fn test_partial_github_config_is_an_error() {
        assert!(matches!(
            config(&[("LLM_MODEL_ID", "m"), ("GITHUB_APP_ID", "123")]),
            Err(ConfigError::Missing("GITHUB_APP_PRIVATE_KEY"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("LLM_MODEL_ID", "m"), ("RAG_TOP_K", "0")]),
            Err(ConfigError::Invalid { name: "RAG_TOP_K", .. })
        ));
        assert!(matches!(
            config(&[("LLM_MODEL_ID", "m"), ("RAG_SIMILARITY_THRESHOLD", "close")]),
            Err(ConfigError::Invalid { name: "RAG_SIMILARITY_THRESHOLD", .. })
        ));
        assert!(matches!(
            config(&[("LLM_MODEL_ID", "m"), ("LLM_PROVIDER", "bedrock")]),
            Err(ConfigError::Invalid { name: "LLM_PROVIDER", .. })
        ));
    }

    #[test]
    fn test_rag_settings() {
        let config = config(&[
            ("LLM_MODEL_ID", "m"),
            ("KNOWLEDGE_DB_PATH", "/data/kb.db"),
            ("RAG_EMBEDDING_MODEL", "bge"),
            ("RAG_SIMILARITY_THRESHOLD", "0.7"),
            ("RAG_TOP_K", "4"),
        ])
        .unwrap();
        assert!(config.retrieval_configured());
        assert_eq!(config.rag.similarity_threshold, Some(0.7));
        assert_eq!(config.rag.top_k, 4);
    }
}
