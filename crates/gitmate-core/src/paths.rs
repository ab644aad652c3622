//! Centralized path utilities

use std::path::PathBuf;

use crate::constants::ui;

/// Get the gitmate config directory (~/.gitmate)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(ui::CONFIG_DIR_NAME)
}

/// Get the logs directory (~/.gitmate/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Get the conversation history directory (~/.gitmate/history)
pub fn history_dir() -> PathBuf {
    config_dir().join("history")
}

/// Default location of the local knowledge store (~/.gitmate/knowledge.db)
pub fn knowledge_db_path() -> PathBuf {
    config_dir().join("knowledge.db")
}
