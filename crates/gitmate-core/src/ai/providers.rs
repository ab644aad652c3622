//! Supported model providers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants;

/// Unique identifier for each supported provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    #[default]
    Ollama,
    OpenAI,
}

impl ProviderId {
    pub fn all() -> &'static [ProviderId] {
        &[ProviderId::Ollama, ProviderId::OpenAI]
    }

    /// Chat completions endpoint used when no base URL override is set
    pub fn default_url(&self) -> &'static str {
        match self {
            ProviderId::Ollama => constants::ai::OLLAMA_URL,
            ProviderId::OpenAI => constants::ai::OPENAI_URL,
        }
    }

    /// Whether requests need an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::OpenAI)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Ollama => write!(f, "ollama"),
            ProviderId::OpenAI => write!(f, "openai"),
        }
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProviderId::Ollama),
            "openai" => Ok(ProviderId::OpenAI),
            other => Err(format!(
                "unsupported LLM provider '{}' (expected one of: ollama, openai)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!("OpenAI".parse::<ProviderId>().unwrap(), ProviderId::OpenAI);
        assert_eq!(" ollama ".parse::<ProviderId>().unwrap(), ProviderId::Ollama);
        assert!("bedrock".parse::<ProviderId>().is_err());
    }
}
