//! Retrieval-first answers with an unaugmented fallback

use std::sync::Arc;

use tracing::info;

use super::retrieval::{ContextBundle, Retriever};
use crate::ai::client::{ModelBackend, ModelRequest};
use crate::ai::types::{Message, Role};
use crate::error::KnowledgeError;

/// Answer text plus the citations it is based on
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeAnswer {
    /// Text to display; carries the `Source Docs:` prefix when cited
    pub text: String,
    pub citations: Option<String>,
    pub found: bool,
}

pub struct KnowledgeAssistant {
    retriever: Arc<Retriever>,
    backend: Arc<dyn ModelBackend>,
}

fn grounded_prompt(query: &str, bundle: &ContextBundle) -> String {
    format!(
        "Answer the question below naturally and directly considering the full conversation history.\n\
         Only use the context if it is helpful. Do not include extra explanation unless necessary.\n\n\
         Context: {}\n\
         Question: {}\n\
         Answer:",
        bundle.context_text(),
        query
    )
}

/// Prior user/assistant exchanges; tool traffic is not replayed
fn chat_history(history: &[Message]) -> Vec<Message> {
    history
        .iter()
        .filter(|m| matches!(m.role(), Role::User | Role::Assistant) && !m.content().is_empty())
        .map(|m| match m.role() {
            Role::User => Message::user(m.content()),
            _ => Message::assistant(m.content()),
        })
        .collect()
}

/// Recent user turns, used to steer retrieval for follow-up questions
fn recent_user_context(history: &[Message], turns: usize) -> Option<String> {
    let recent: Vec<&str> = history
        .iter()
        .rev()
        .filter(|m| m.role() == Role::User)
        .take(turns)
        .map(Message::content)
        .collect();
    if recent.is_empty() {
        return None;
    }
    Some(recent.into_iter().rev().collect::<Vec<_>>().join("\n"))
}

impl KnowledgeAssistant {
    pub fn new(retriever: Arc<Retriever>, backend: Arc<dyn ModelBackend>) -> Self {
        Self { retriever, backend }
    }

    /// Answer `query` from the knowledge store when it has relevant
    /// context, otherwise straight from the model without citations.
    ///
    /// Retrieval failures are returned, never treated as "nothing found".
    pub async fn answer(
        &self,
        query: &str,
        history: &[Message],
    ) -> Result<KnowledgeAnswer, KnowledgeError> {
        let context = recent_user_context(history, 2);
        let bundle = self.retriever.retrieve(query, context.as_deref()).await?;

        let mut messages = chat_history(history);
        if bundle.found {
            messages.push(Message::user(grounded_prompt(query, &bundle)));
        } else {
            messages.push(Message::user(query));
        }

        let reply = self
            .backend
            .complete(ModelRequest {
                system_prompt: "",
                messages: &messages,
                tools: &[],
            })
            .await?;
        let answer = reply.content.trim();

        if bundle.found {
            let citations = bundle.citation_text();
            info!(sources = %citations, "Answered from knowledge store");
            Ok(KnowledgeAnswer {
                text: format!("Source Docs: {}\n\n{}", citations, answer),
                citations: Some(citations),
                found: true,
            })
        } else {
            info!("No relevant knowledge, answered without context");
            Ok(KnowledgeAnswer {
                text: answer.to_string(),
                citations: None,
                found: false,
            })
        }
    }
}
