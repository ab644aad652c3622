//! Tools the agent can call
//!
//! Every tool reports failures through the `{"fatal_error": true, "message": ...}`
//! envelope, so the dispatcher only has to execute and forward.

pub mod implementations;
pub mod path_utils;
pub mod registry;
pub mod schema;

pub use implementations::{register_all_tools, ToolServices};
pub use registry::{parse_params, Tool, ToolContext, ToolRegistry, ToolResult};
pub use schema::{compile_schema, sanitize_tool_name, validate_arguments};
