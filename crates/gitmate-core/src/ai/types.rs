//! Conversation and tool-calling types shared by the agent and model clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition handed to the model (name, description, JSON schema)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A model-issued request to run a named tool. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::Tool { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// Tool calls carried by an assistant message (empty for other roles)
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// What one model call returns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn into_message(self) -> Message {
        Message::Assistant {
            content: self.content,
            tool_calls: self.tool_calls,
        }
    }
}

/// Ordered, append-only message history of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Tool calls of the trailing assistant message that have no result yet.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCall> {
        let Some(assistant_idx) = self
            .messages
            .iter()
            .rposition(|m| m.role() == Role::Assistant)
        else {
            return Vec::new();
        };

        let resolved: Vec<&str> = self.messages[assistant_idx + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        self.messages[assistant_idx]
            .tool_calls()
            .iter()
            .filter(|call| !resolved.contains(&call.id.as_str()))
            .collect()
    }

    /// Append the results of a dispatch phase.
    ///
    /// The last message must be an assistant message and `results` must carry
    /// exactly its tool call ids, in the same order.
    pub fn append_tool_results(&mut self, results: Vec<Message>) -> Result<(), String> {
        let expected: Vec<String> = match self.messages.last() {
            Some(Message::Assistant { tool_calls, .. }) if !tool_calls.is_empty() => {
                tool_calls.iter().map(|c| c.id.clone()).collect()
            }
            _ => return Err("tool results must follow an assistant message with tool calls".into()),
        };

        let actual: Vec<&str> = results
            .iter()
            .map(|m| match m {
                Message::Tool { tool_call_id, .. } => Ok(tool_call_id.as_str()),
                other => Err(other.role()),
            })
            .collect::<Result<_, _>>()
            .map_err(|role| format!("expected tool results, got a {:?} message", role))?;

        if actual != expected.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(format!(
                "tool result ids {:?} do not match tool calls {:?}",
                actual, expected
            ));
        }

        self.messages.extend(results);
        Ok(())
    }

    /// Text of the last assistant message, if any
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == Role::Assistant)
            .map(Message::content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "list_open_pull_requests".to_string(),
            arguments: json!({}),
        }
    }

    fn conversation_with_calls(ids: &[&str]) -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("hi"));
        conversation.push(Message::Assistant {
            content: String::new(),
            tool_calls: ids.iter().map(|id| call(id)).collect(),
        });
        conversation
    }

    #[test]
    fn test_append_tool_results_in_call_order() {
        let mut conversation = conversation_with_calls(&["a", "b"]);
        assert_eq!(conversation.pending_tool_calls().len(), 2);

        conversation
            .append_tool_results(vec![
                Message::tool_result("a", "1"),
                Message::tool_result("b", "2"),
            ])
            .unwrap();

        assert!(conversation.pending_tool_calls().is_empty());
        assert_eq!(conversation.len(), 4);
    }

    #[test]
    fn test_append_tool_results_rejects_mismatched_ids() {
        let mut conversation = conversation_with_calls(&["a", "b"]);

        let err = conversation
            .append_tool_results(vec![Message::tool_result("a", "1")])
            .unwrap_err();
        assert!(err.contains("do not match"));

        let err = conversation
            .append_tool_results(vec![
                Message::tool_result("b", "2"),
                Message::tool_result("a", "1"),
            ])
            .unwrap_err();
        assert!(err.contains("do not match"));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_append_tool_results_requires_assistant_with_calls() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("hi"));
        assert!(conversation
            .append_tool_results(vec![Message::tool_result("a", "1")])
            .is_err());
    }

    #[test]
    fn test_message_serialization_is_role_tagged() {
        let msg = Message::tool_result("call_1", "ok");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");

        let assistant = serde_json::to_value(Message::assistant("done")).unwrap();
        assert!(assistant.get("tool_calls").is_none());
    }
}
