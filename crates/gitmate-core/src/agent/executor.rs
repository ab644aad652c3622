//! Tool execution for the orchestration loop.
//!
//! Handles:
//! - Sequential dispatch in ToolCall order via `ToolRegistry::dispatch()`
//! - Output truncation
//! - `LoopEvent::ToolExecuting` / `LoopEvent::ToolResult` emission

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::ai::types::{Message, ToolCall};
use crate::constants::agent::MAX_TOOL_OUTPUT_CHARS;
use crate::tools::registry::{ToolContext, ToolRegistry};

use super::context::SessionContext;
use super::loop_events::LoopEvent;

/// Resolve every call into a tool-result message, in call order.
///
/// Tool failures arrive as error envelopes, so one failing call never
/// prevents its siblings from running.
pub(crate) async fn execute_tools(
    tool_calls: &[ToolCall],
    registry: &ToolRegistry,
    session: &SessionContext,
    tool_timeout: Option<Duration>,
    events: Option<&mpsc::UnboundedSender<LoopEvent>>,
) -> Vec<Message> {
    let mut ctx = ToolContext::new(session.clone());
    if let Some(timeout) = tool_timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let mut results = Vec::with_capacity(tool_calls.len());

    for call in tool_calls {
        emit(
            events,
            LoopEvent::ToolExecuting {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        );

        let span = tracing::info_span!("tool", tool = %call.name, call_id = %call.id);
        let result = registry
            .dispatch(&call.name, call.arguments.clone(), &ctx)
            .instrument(span)
            .await;

        let output = truncate_output(&result.output);

        emit(
            events,
            LoopEvent::ToolResult {
                id: call.id.clone(),
                output: output.clone(),
                is_error: result.is_error,
            },
        );

        results.push(Message::tool_result(call.id.clone(), output));
    }

    results
}

pub(crate) fn emit(events: Option<&mpsc::UnboundedSender<LoopEvent>>, event: LoopEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

pub(crate) fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_TOOL_OUTPUT_CHARS {
        return output.to_string();
    }

    let truncated_len = floor_char_boundary(output, MAX_TOOL_OUTPUT_CHARS);
    let truncated = &output[..truncated_len];
    let break_point = truncated.rfind('\n').unwrap_or(truncated_len);
    let clean = &output[..break_point];
    format!(
        "{}\n\n[... OUTPUT TRUNCATED: {} chars -> {} chars ...]",
        clean,
        output.len(),
        clean.len()
    )
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_output_untouched() {
        assert_eq!(truncate_output("ok"), "ok");
    }

    #[test]
    fn test_truncates_at_line_boundary() {
        let line = "x".repeat(99);
        let output = vec![line.as_str(); 1000].join("\n");
        let truncated = truncate_output(&output);

        let (body, marker) = truncated.split_once("\n\n[... OUTPUT TRUNCATED").unwrap();
        assert!(body.len() <= MAX_TOOL_OUTPUT_CHARS);
        assert!(body.ends_with('x'));
        assert_eq!(body.len() % 100, 99);
        assert!(marker.contains(&output.len().to_string()));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let output = "é".repeat(MAX_TOOL_OUTPUT_CHARS);
        let truncated = truncate_output(&output);
        assert!(truncated.contains("OUTPUT TRUNCATED"));
    }
}
