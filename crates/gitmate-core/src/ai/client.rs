//! Model backend boundary and the OpenAI-compatible HTTP client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info};

use crate::ai::format::openai;
use crate::ai::providers::ProviderId;
use crate::ai::types::{AiTool, AssistantReply, Message};
use crate::constants;
use crate::error::ModelInvocationError;

/// One model call: system instruction, history and tool schemas
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system_prompt: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [AiTool],
}

/// Anything that can answer a model call with function-calling semantics
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(
        &self,
        request: ModelRequest<'_>,
    ) -> Result<AssistantReply, ModelInvocationError>;
}

/// Configuration for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    /// Model ID to use for API calls
    pub model: String,
    /// Maximum output tokens
    pub max_tokens: usize,
    /// Optional endpoint override (defaults to provider default)
    pub base_url: Option<String>,
    pub provider_id: ProviderId,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl AiClientConfig {
    pub fn new(provider_id: ProviderId, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
            base_url: None,
            provider_id,
            api_key: None,
            request_timeout: Duration::from_secs(constants::ai::REQUEST_TIMEOUT_SECS),
        }
    }

    /// Get the API URL to use
    pub fn api_url(&self) -> String {
        match &self.base_url {
            Some(base) => base.clone(),
            None => self.provider_id.default_url().to_string(),
        }
    }
}

/// Chat completions client for OpenAI and Ollama
pub struct AiClient {
    http: reqwest::Client,
    config: AiClientConfig,
}

impl AiClient {
    pub fn new(config: AiClientConfig) -> Self {
        info!(
            provider = %config.provider_id,
            model = %config.model,
            "AI client configured"
        );
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    fn build_request(&self) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(self.config.api_url())
            .timeout(self.config.request_timeout)
            .header("content-type", "application/json");

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    async fn handle_error_response(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ModelInvocationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);

        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
            return Err(ModelInvocationError::Unreachable(format!(
                "{}: {}",
                status, message
            )));
        }

        Err(ModelInvocationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    /// Single question, no tools. Used by the knowledge assistant.
    pub async fn call_simple(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ModelInvocationError> {
        let messages = [Message::user(user_message)];
        let reply = self
            .complete(ModelRequest {
                system_prompt,
                messages: &messages,
                tools: &[],
            })
            .await?;
        Ok(reply.content.trim().to_string())
    }
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> ModelInvocationError {
    if err.is_timeout() {
        ModelInvocationError::Timeout(timeout)
    } else {
        ModelInvocationError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl ModelBackend for AiClient {
    async fn complete(
        &self,
        request: ModelRequest<'_>,
    ) -> Result<AssistantReply, ModelInvocationError> {
        let body = openai::build_request_body(
            &self.config.model,
            request.system_prompt,
            request.messages,
            request.tools,
            self.config.max_tokens,
        );

        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling model"
        );

        let timeout = self.config.request_timeout;
        let response = self
            .build_request()
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;
        let response = Self::handle_error_response(response).await?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| ModelInvocationError::InvalidResponse(e.to_string()))?;

        let reply = openai::parse_response(&json)?;
        debug!(tool_calls = reply.tool_calls.len(), "Model replied");
        Ok(reply)
    }
}
