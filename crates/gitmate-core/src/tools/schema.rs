//! Argument validation against a tool's declared JSON schema

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{RegistryError, ToolInvocationError};

/// Compile a tool's parameter schema once, at registration
pub fn compile_schema(tool: &str, schema: &Value) -> Result<Validator, RegistryError> {
    jsonschema::validator_for(schema).map_err(|e| RegistryError::InvalidSchema {
        name: tool.to_string(),
        message: e.to_string(),
    })
}

/// Check `args` against a compiled schema before the tool is invoked
pub fn validate_arguments(validator: &Validator, args: &Value) -> Result<(), ToolInvocationError> {
    let messages: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ToolInvocationError::InvalidArguments(messages.join(", ")))
    }
}

/// Make a name acceptable to the model's function-calling interface:
/// whitespace runs become `_`, anything outside `[A-Za-z0-9_-]` is dropped.
pub fn sanitize_tool_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            pending_sep = true;
            continue;
        }
        if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(ch);
    }
    out
}
