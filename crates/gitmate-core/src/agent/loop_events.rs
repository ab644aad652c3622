//! Events emitted by the orchestration loop.
//!
//! Presentation layers (the terminal chat, a future web front end) consume
//! these and map them to their own display format. Sending is best effort:
//! a dropped receiver never affects the turn.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// A model call is about to be made.
    ModelTurnStarted { iteration: usize },

    /// Tool is being executed.
    ToolExecuting {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// Tool execution completed with result.
    ToolResult {
        id: String,
        output: String,
        is_error: bool,
    },

    /// A ModelTurn -> Dispatching cycle completed.
    TurnComplete { iteration: usize, has_more: bool },

    /// The turn ended.
    Finished { session_id: String },

    /// The turn failed.
    Error { error: String },
}
