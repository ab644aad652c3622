//! Persistence layer
//!
//! JSON files, one per user, holding the conversation history.

mod history;

pub use history::HistoryStore;
