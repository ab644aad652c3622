//! System instruction injected on every model call (never persisted)

use crate::tools::ToolRegistry;

const PREAMBLE: &str = "You are GitMate, an assistant for a software team with access to tools. Follow these rules:
1. For general knowledge and conversation, answer from your own knowledge.
2. Only use tools when asked to do something on the GitHub repository, to look up the team's knowledge base, or to find videos.
3. Use the most specific tool for the task.
4. If a tool result has \"fatal_error\": true, do not retry the same call with the same arguments; explain what could not be done.
5. Think step by step before using tools.";

/// Build the system instruction for the tools currently registered
pub fn build_system_prompt(registry: &ToolRegistry) -> String {
    let tools = registry.ai_tools();
    if tools.is_empty() {
        return PREAMBLE.to_string();
    }

    let mut prompt = String::from(PREAMBLE);
    prompt.push_str("\n\nAvailable tools:\n");
    for tool in tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    prompt
}
