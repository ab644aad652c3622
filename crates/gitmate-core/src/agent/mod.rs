//! Agent system for GitMate
//!
//! ## Orchestrator
//! - `AgentOrchestrator` - the Start -> ModelTurn <-> Dispatching -> End loop
//! - `LoopEvent` - events for presentation layers
//! - `OrchestratorConfig` / `TurnOutcome` - configuration and results
//!
//! ## Support
//! - `SessionContext` - explicit per-session correlation context
//! - `build_system_prompt` - tool guidance injected on every model call

pub mod context;
pub mod executor;
pub mod instructions;
pub mod loop_events;
pub mod orchestrator;

pub use context::SessionContext;
pub use instructions::build_system_prompt;
pub use loop_events::LoopEvent;
pub use orchestrator::{AgentOrchestrator, AgentPhase, OrchestratorConfig, TurnOutcome};
