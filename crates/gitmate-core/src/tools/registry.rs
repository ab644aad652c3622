//! Tool registry: typed name -> implementation map, built once at startup
//!
//! Registration validates names; after that the registry is only read, so it
//! can be shared across sessions behind an `Arc` without locking.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::agent::context::SessionContext;
use crate::ai::types::AiTool;
use crate::constants;
use crate::error::{RegistryError, ToolInvocationError};
use crate::tools::schema::{compile_schema, validate_arguments};

/// Tool execution result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a plain text success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create a success result carrying JSON text
    pub fn success_data(data: Value) -> Self {
        Self {
            output: data.to_string(),
            is_error: false,
        }
    }

    /// The `{"fatal_error": true, "message": ...}` envelope
    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self {
            output: json!({
                "fatal_error": true,
                "message": msg.to_string()
            })
            .to_string(),
            is_error: true,
        }
    }

    pub fn from_error(err: &ToolInvocationError) -> Self {
        Self::error(err)
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| {
        ToolResult::from_error(&ToolInvocationError::InvalidArguments(e.to_string()))
    })
}

/// Context for tool execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Session the call belongs to (log correlation, per-user scoping)
    pub session: SessionContext,
    /// Optional per-call timeout override
    pub timeout: Option<Duration>,
}

impl ToolContext {
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id); must be unique and whitespace-free
    fn name(&self) -> &str;

    /// Tool description for AI
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. Failures are returned as an error envelope, never raised.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Registry for managing tools
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    /// Compiled parameter schemas, parallel to `tools`
    validators: Vec<jsonschema::Validator>,
    by_name: HashMap<String, usize>,
    /// Default timeout for tool execution
    default_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            validators: Vec::new(),
            by_name: HashMap::new(),
            default_timeout: Duration::from_secs(constants::agent::TOOL_TIMEOUT_SECS),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool, rejecting invalid or duplicate names and schemas
    /// that do not compile
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        let validator = compile_schema(&name, &tool.parameters_schema())?;

        tracing::debug!(tool = %name, "Registered tool");
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        self.validators.push(validator);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tools as AI tool definitions, in registration order
    pub fn ai_tools(&self) -> Vec<AiTool> {
        self.tools
            .iter()
            .map(|t| AiTool {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect()
    }

    /// Validate arguments and execute a tool under a timeout.
    ///
    /// Always yields a `ToolResult`; unknown tools, bad arguments and
    /// timeouts come back as the error envelope.
    pub async fn dispatch(&self, name: &str, params: Value, ctx: &ToolContext) -> ToolResult {
        let Some(&idx) = self.by_name.get(name) else {
            tracing::warn!(tool = name, "Model requested an unknown tool");
            return ToolResult::from_error(&ToolInvocationError::UnknownTool(name.to_string()));
        };
        let tool = &self.tools[idx];

        // absent arguments are an empty object
        let params = if params.is_null() { json!({}) } else { params };
        if let Err(e) = validate_arguments(&self.validators[idx], &params) {
            tracing::info!(tool = name, error = %e, "Rejected tool arguments");
            return ToolResult::from_error(&e);
        }

        let timeout = ctx.timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    timeout_secs = timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolResult::from_error(&ToolInvocationError::Timeout {
                    tool: name.to_string(),
                    timeout,
                })
            }
        };

        tracing::info!(
            tool = name,
            is_error = result.is_error,
            duration_ms = start.elapsed().as_millis() as u64,
            "Tool finished"
        );
        result
    }
}
