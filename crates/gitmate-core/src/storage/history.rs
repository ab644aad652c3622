//! Per-user conversation history
//!
//! Stored as `chat_history_<user_id>.json`: an array of
//! `{type, content, additional_kwargs, response_metadata}` records.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::ai::types::{Conversation, Message, ToolCall};
use crate::error::HistoryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HistoryRecord {
    #[serde(rename = "type")]
    kind: String,
    content: String,
    #[serde(default)]
    additional_kwargs: Map<String, Value>,
    #[serde(default)]
    response_metadata: Map<String, Value>,
}

impl HistoryRecord {
    fn new(kind: &str, content: &str) -> Self {
        Self {
            kind: kind.to_string(),
            content: content.to_string(),
            additional_kwargs: Map::new(),
            response_metadata: Map::new(),
        }
    }
}

fn to_record(message: &Message) -> HistoryRecord {
    match message {
        Message::System { content } => HistoryRecord::new("system", content),
        Message::User { content } => HistoryRecord::new("user", content),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut record = HistoryRecord::new("assistant", content);
            if !tool_calls.is_empty() {
                record.additional_kwargs.insert(
                    "tool_calls".to_string(),
                    serde_json::to_value(tool_calls).unwrap_or(Value::Null),
                );
            }
            record
        }
        Message::Tool {
            tool_call_id,
            content,
        } => {
            let mut record = HistoryRecord::new("tool", content);
            record
                .additional_kwargs
                .insert("tool_call_id".to_string(), Value::String(tool_call_id.clone()));
            record
        }
    }
}

fn from_record(record: HistoryRecord) -> Result<Message, String> {
    match record.kind.as_str() {
        "system" => Ok(Message::system(record.content)),
        "user" => Ok(Message::user(record.content)),
        "assistant" => {
            let tool_calls: Vec<ToolCall> = match record.additional_kwargs.get("tool_calls") {
                Some(value) => serde_json::from_value(value.clone())
                    .map_err(|e| format!("bad tool_calls: {}", e))?,
                None => Vec::new(),
            };
            Ok(Message::Assistant {
                content: record.content,
                tool_calls,
            })
        }
        "tool" => {
            let id = record
                .additional_kwargs
                .get("tool_call_id")
                .and_then(Value::as_str)
                .ok_or("tool record without tool_call_id")?;
            Ok(Message::tool_result(id, record.content))
        }
        other => Err(format!("unknown record type '{}'", other)),
    }
}

/// Reads and writes conversation files in one directory
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `user_id`'s conversation
    pub fn path_for(&self, user_id: &str) -> Result<PathBuf, HistoryError> {
        let valid = !user_id.is_empty()
            && user_id != "."
            && user_id != ".."
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
        if !valid {
            return Err(HistoryError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.dir.join(format!("chat_history_{}.json", user_id)))
    }

    /// Load a user's conversation; a missing file is an empty conversation
    pub fn load(&self, user_id: &str) -> Result<Conversation, HistoryError> {
        let path = self.path_for(user_id)?;
        if !path.exists() {
            info!(user_id, "No previous conversation history found");
            return Ok(Conversation::new());
        }

        let display = path.display().to_string();
        let contents = fs::read_to_string(&path).map_err(|source| HistoryError::Io {
            path: display.clone(),
            source,
        })?;
        let records: Vec<HistoryRecord> =
            serde_json::from_str(&contents).map_err(|e| HistoryError::Malformed {
                path: display.clone(),
                message: e.to_string(),
            })?;

        let messages = records
            .into_iter()
            .map(from_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| HistoryError::Malformed {
                path: display.clone(),
                message,
            })?;

        info!(user_id, messages = messages.len(), "Loaded conversation history");
        Ok(Conversation::from_messages(messages))
    }

    pub fn save(&self, user_id: &str, conversation: &Conversation) -> Result<(), HistoryError> {
        let path = self.path_for(user_id)?;
        let display = path.display().to_string();
        let io_err = |source: std::io::Error| HistoryError::Io {
            path: display.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;

        let records: Vec<HistoryRecord> = conversation.messages().iter().map(to_record).collect();
        let contents =
            serde_json::to_string_pretty(&records).map_err(|e| HistoryError::Malformed {
                path: display.clone(),
                message: e.to_string(),
            })?;

        // write-then-rename; readers never observe a partial file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        info!(user_id, messages = conversation.len(), "Saved conversation history");
        Ok(())
    }
}
