//! Orchestration state machine: the single agentic loop.
//!
//! One `run_turn` drives a Turn through explicit phases:
//!
//! ```text
//!  Start ──► ModelTurn ──(tool calls)──► Dispatching
//!               ▲  │                          │
//!               │  └──(no tool calls)──► End  │
//!               └─────────────────────────────┘
//! ```
//!
//! The caller's `Conversation` is only replaced when the Turn ends without a
//! model error, so a failed Turn leaves no partial assistant message behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn, Instrument};

use crate::ai::client::{ModelBackend, ModelRequest};
use crate::ai::types::{Conversation, Message, ToolCall};
use crate::constants;
use crate::error::{AgentError, ModelInvocationError};
use crate::tools::registry::ToolRegistry;

use super::context::SessionContext;
use super::executor::{self, emit};
use super::instructions::build_system_prompt;
use super::loop_events::LoopEvent;

/// Phase of the orchestration state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Start,
    ModelTurn,
    Dispatching,
    End,
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Cap on ModelTurns per Turn
    pub max_iterations: usize,
    pub model_timeout: Duration,
    /// Per tool call; `None` uses the registry default
    pub tool_timeout: Option<Duration>,
    /// Overrides the instruction generated from the registered tools
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: constants::agent::MAX_ITERATIONS,
            model_timeout: Duration::from_secs(constants::ai::REQUEST_TIMEOUT_SECS),
            tool_timeout: None,
            system_prompt: None,
        }
    }
}

/// How a Turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without requesting tools
    Completed { answer: String, iterations: usize },
    /// The cycle cap was hit; every tool call issued was still resolved
    MaxIterationsReached { iterations: usize },
}

impl TurnOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            TurnOutcome::Completed { answer, .. } => Some(answer),
            TurnOutcome::MaxIterationsReached { .. } => None,
        }
    }
}

/// Drives Turns for any number of sessions; holds no per-session state.
pub struct AgentOrchestrator {
    backend: Arc<dyn ModelBackend>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
    system_prompt: String,
}

impl AgentOrchestrator {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| build_system_prompt(&registry));
        Self {
            backend,
            registry,
            config,
            system_prompt,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run one Turn for `user_message` on top of `conversation`.
    ///
    /// On success the conversation holds the user message, every assistant
    /// message and every tool result of the Turn. On error it is unchanged.
    pub async fn run_turn(
        &self,
        session: &SessionContext,
        conversation: &mut Conversation,
        user_message: &str,
        events: Option<mpsc::UnboundedSender<LoopEvent>>,
    ) -> Result<TurnOutcome, AgentError> {
        let result = self
            .run_turn_inner(session, conversation, user_message, events.as_ref())
            .instrument(session.span())
            .await;

        match &result {
            Ok(_) => emit(
                events.as_ref(),
                LoopEvent::Finished {
                    session_id: session.session_id.clone(),
                },
            ),
            Err(e) => emit(
                events.as_ref(),
                LoopEvent::Error {
                    error: e.to_string(),
                },
            ),
        }
        result
    }

    async fn run_turn_inner(
        &self,
        session: &SessionContext,
        conversation: &mut Conversation,
        user_message: &str,
        events: Option<&mpsc::UnboundedSender<LoopEvent>>,
    ) -> Result<TurnOutcome, AgentError> {
        if !conversation.pending_tool_calls().is_empty() {
            return Err(AgentError::Invariant(
                "conversation ends with unresolved tool calls".to_string(),
            ));
        }

        let mut working = conversation.clone();
        working.push(Message::user(user_message));

        let tools = self.registry.ai_tools();
        let mut phase = AgentPhase::Start;
        let mut iteration = 0usize;
        let mut pending: Vec<ToolCall> = Vec::new();

        let outcome = loop {
            match phase {
                AgentPhase::Start => phase = AgentPhase::ModelTurn,

                AgentPhase::ModelTurn => {
                    if iteration >= self.config.max_iterations {
                        warn!(
                            iterations = iteration,
                            "Turn hit the iteration cap, stopping"
                        );
                        break TurnOutcome::MaxIterationsReached {
                            iterations: iteration,
                        };
                    }
                    iteration += 1;
                    emit(events, LoopEvent::ModelTurnStarted { iteration });

                    let request = ModelRequest {
                        system_prompt: &self.system_prompt,
                        messages: working.messages(),
                        tools: &tools,
                    };
                    let reply = tokio::time::timeout(
                        self.config.model_timeout,
                        self.backend.complete(request),
                    )
                    .await
                    .map_err(|_| ModelInvocationError::Timeout(self.config.model_timeout))??;

                    pending = reply.tool_calls.clone();
                    working.push(reply.into_message());

                    phase = if pending.is_empty() {
                        AgentPhase::End
                    } else {
                        info!(
                            iteration,
                            tool_calls = pending.len(),
                            "Model requested tools"
                        );
                        AgentPhase::Dispatching
                    };
                }

                AgentPhase::Dispatching => {
                    let calls = std::mem::take(&mut pending);
                    let results = executor::execute_tools(
                        &calls,
                        &self.registry,
                        session,
                        self.config.tool_timeout,
                        events,
                    )
                    .await;
                    working
                        .append_tool_results(results)
                        .map_err(AgentError::Invariant)?;

                    emit(
                        events,
                        LoopEvent::TurnComplete {
                            iteration,
                            has_more: true,
                        },
                    );
                    phase = AgentPhase::ModelTurn;
                }

                AgentPhase::End => {
                    emit(
                        events,
                        LoopEvent::TurnComplete {
                            iteration,
                            has_more: false,
                        },
                    );
                    break TurnOutcome::Completed {
                        answer: working.last_assistant_text().unwrap_or_default().to_string(),
                        iterations: iteration,
                    };
                }
            }
        };

        info!(iterations = iteration, messages = working.len(), "Turn finished");
        *conversation = working;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_support::ScriptedBackend;
    use crate::ai::types::{AssistantReply, Role};
    use crate::tools::registry::{Tool, ToolContext, ToolResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase the text"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
            let text = params["text"].as_str().unwrap_or_default();
            ToolResult::success_data(json!({"upper": text.to_uppercase()}))
        }
    }

    fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    fn calls(tool_calls: Vec<ToolCall>) -> AssistantReply {
        AssistantReply {
            content: String::new(),
            tool_calls,
        }
    }

    fn orchestrator(backend: Arc<dyn ModelBackend>, config: OrchestratorConfig) -> AgentOrchestrator {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(UpperTool)).unwrap();
        AgentOrchestrator::new(backend, Arc::new(registry), config)
    }

    fn session() -> SessionContext {
        SessionContext::new("tester")
    }

    #[tokio::test]
    async fn test_plain_answer_ends_turn() {
        let backend = Arc::new(ScriptedBackend::new([Ok(AssistantReply::text("Hello!"))]));
        let agent = orchestrator(backend.clone(), OrchestratorConfig::default());
        let mut conversation = Conversation::new();

        let outcome = agent
            .run_turn(&session(), &mut conversation, "hi", None)
            .await
            .unwrap();

        assert_eq!(outcome.answer(), Some("Hello!"));
        assert_eq!(conversation.len(), 2);
        assert!(conversation
            .messages()
            .iter()
            .all(|m| m.role() != Role::System));

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system_prompt.contains("- upper: Uppercase the text"));
        assert_eq!(requests[0].tool_names, vec!["upper"]);
    }

    #[tokio::test]
    async fn test_tool_results_follow_call_order() {
        let backend = Arc::new(ScriptedBackend::new([
            Ok(calls(vec![
                call("c1", "upper", json!({"text": "a"})),
                call("c2", "missing_tool", json!({})),
                call("c3", "upper", json!({"text": "b"})),
            ])),
            Ok(AssistantReply::text("A and B")),
        ]));
        let agent = orchestrator(backend.clone(), OrchestratorConfig::default());
        let mut conversation = Conversation::new();

        let outcome = agent
            .run_turn(&session(), &mut conversation, "shout", None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                answer: "A and B".into(),
                iterations: 2
            }
        );

        let messages = conversation.messages();
        assert_eq!(messages.len(), 6);
        let ids: Vec<&str> = messages[2..5]
            .iter()
            .map(|m| match m {
                Message::Tool { tool_call_id, .. } => tool_call_id.as_str(),
                other => panic!("expected tool result, got {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(messages[3].content().contains("\"fatal_error\":true"));
        assert!(messages[4].content().contains("\"B\""));

        // second model call saw all three results
        assert_eq!(backend.requests()[1].messages.len(), 5);
    }

    #[tokio::test]
    async fn test_model_error_leaves_conversation_untouched() {
        let backend = Arc::new(ScriptedBackend::new([
            Ok(calls(vec![call("c1", "upper", json!({"text": "a"}))])),
            Err(ModelInvocationError::Unreachable("connection refused".into())),
        ]));
        let agent = orchestrator(backend, OrchestratorConfig::default());
        let mut conversation = Conversation::from_messages(vec![
            Message::user("earlier"),
            Message::assistant("reply"),
        ]);
        let before = conversation.clone();

        let err = agent
            .run_turn(&session(), &mut conversation, "again", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Model(ModelInvocationError::Unreachable(_))));
        assert_eq!(conversation, before);
    }

    #[tokio::test]
    async fn test_iteration_cap_resolves_every_call() {
        let backend = Arc::new(ScriptedBackend::new(
            (0..3).map(|i| Ok(calls(vec![call(&format!("c{i}"), "upper", json!({"text": "x"}))]))),
        ));
        let config = OrchestratorConfig {
            max_iterations: 3,
            ..OrchestratorConfig::default()
        };
        let agent = orchestrator(backend.clone(), config);
        let mut conversation = Conversation::new();

        let outcome = agent
            .run_turn(&session(), &mut conversation, "loop forever", None)
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::MaxIterationsReached { iterations: 3 });
        assert_eq!(outcome.answer(), None);
        assert_eq!(backend.requests().len(), 3);
        assert!(conversation.pending_tool_calls().is_empty());
        assert_eq!(conversation.len(), 1 + 3 * 2);
    }

    struct StalledBackend;

    #[async_trait]
    impl ModelBackend for StalledBackend {
        async fn complete(
            &self,
            _request: ModelRequest<'_>,
        ) -> Result<AssistantReply, ModelInvocationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AssistantReply::text("too late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_timeout() {
        let config = OrchestratorConfig {
            model_timeout: Duration::from_secs(5),
            ..OrchestratorConfig::default()
        };
        let agent = orchestrator(Arc::new(StalledBackend), config);
        let mut conversation = Conversation::new();

        let err = agent
            .run_turn(&session(), &mut conversation, "hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Model(ModelInvocationError::Timeout(_))));
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unresolved_history() {
        let backend = Arc::new(ScriptedBackend::new([]));
        let agent = orchestrator(backend, OrchestratorConfig::default());
        let mut conversation = Conversation::from_messages(vec![
            Message::user("q"),
            calls(vec![call("c1", "upper", json!({"text": "a"}))]).into_message(),
        ]);

        let err = agent
            .run_turn(&session(), &mut conversation, "next", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Invariant(_)));
    }

    #[tokio::test]
    async fn test_emits_events_in_order() {
        let backend = Arc::new(ScriptedBackend::new([
            Ok(calls(vec![call("c1", "upper", json!({"text": "a"}))])),
            Ok(AssistantReply::text("done")),
        ]));
        let agent = orchestrator(backend, OrchestratorConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = session();

        agent
            .run_turn(&session, &mut Conversation::new(), "go", Some(tx))
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec![
                "model_turn_started",
                "tool_executing",
                "tool_result",
                "turn_complete",
                "model_turn_started",
                "turn_complete",
                "finished"
            ]
        );
    }
}
