//! OpenAI chat/completions format
//!
//! Both OpenAI and Ollama's `/v1/chat/completions` endpoint speak this format.
//! Tool call arguments travel as JSON text and are decoded here.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::ai::types::{AiTool, AssistantReply, Message, ToolCall};
use crate::error::ModelInvocationError;

/// Convert domain messages to OpenAI chat messages
pub fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| match msg {
            Message::System { content } => json!({ "role": "system", "content": content }),
            Message::User { content } => json!({ "role": "user", "content": content }),
            Message::Tool {
                tool_call_id,
                content,
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content
            }),
            Message::Assistant {
                content,
                tool_calls,
            } if !tool_calls.is_empty() => {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string()
                            }
                        })
                    })
                    .collect();
                let mut obj = json!({ "role": "assistant", "tool_calls": calls });
                if !content.is_empty() {
                    obj["content"] = json!(content);
                }
                obj
            }
            Message::Assistant { content, .. } => {
                json!({ "role": "assistant", "content": content })
            }
        })
        .collect()
}

/// Tool definitions, nested under "function"
pub fn convert_tools(tools: &[AiTool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema
                }
            })
        })
        .collect()
}

/// Build the request body. The system prompt is inserted as the first message.
pub fn build_request_body(
    model: &str,
    system_prompt: &str,
    messages: &[Message],
    tools: &[AiTool],
    max_tokens: usize,
) -> Value {
    let mut chat = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        chat.push(json!({ "role": "system", "content": system_prompt }));
    }
    chat.extend(convert_messages(messages));

    let mut body = json!({
        "model": model,
        "messages": chat,
        "max_tokens": max_tokens,
        "stream": false,
    });

    if !tools.is_empty() {
        body["tools"] = json!(convert_tools(tools));
    }

    body
}

/// Decode a chat completion response into an assistant reply
pub fn parse_response(json: &Value) -> Result<AssistantReply, ModelInvocationError> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            ModelInvocationError::InvalidResponse("response has no choices[0].message".into())
        })?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default();

    Ok(AssistantReply {
        content,
        tool_calls,
    })
}

fn parse_tool_call(call: &Value) -> Option<ToolCall> {
    let function = call.get("function")?;
    let Some(name) = function.get("name").and_then(|n| n.as_str()) else {
        warn!("Dropping tool call without a function name: {}", call);
        return None;
    };

    let id = call
        .get("id")
        .and_then(|i| i.as_str())
        .filter(|i| !i.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or_else(|e| {
            debug!("Tool call {} has non-JSON arguments: {}", id, e);
            Value::String(raw.clone())
        }),
        // Ollama may send the arguments object directly
        Some(other) => other.clone(),
        None => json!({}),
    };

    Some(ToolCall {
        id,
        name: name.to_string(),
        arguments,
    })
}
