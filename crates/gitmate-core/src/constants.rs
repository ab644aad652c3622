//! Shared defaults

pub mod github {
    pub const API_URL: &str = "https://api.github.com";
    pub const API_VERSION: &str = "2022-11-28";
    pub const USER_AGENT: &str = "GitMate/0.2";
    /// Installation tokens live for an hour; refresh well before that.
    pub const TOKEN_TTL_SECS: u64 = 3000;
    pub const TOKEN_REFRESH_TIMEOUT_SECS: u64 = 30;
    pub const PER_PAGE: usize = 100;
    pub const MAX_PAGES: usize = 10;
}

pub mod ai {
    pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
    pub const OLLAMA_URL: &str = "http://localhost:11434/v1/chat/completions";
    pub const MAX_OUTPUT_TOKENS: usize = 4096;
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
}

pub mod youtube {
    pub const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
    pub const WATCH_URL: &str = "https://www.youtube.com/watch";
    pub const DEFAULT_RESULTS: u64 = 5;
    pub const MAX_RESULTS: u64 = 25;
}

pub mod agent {
    pub const MAX_ITERATIONS: usize = 25;
    pub const TOOL_TIMEOUT_SECS: u64 = 60;
    pub const MAX_TOOL_OUTPUT_CHARS: usize = 30_000;
}

pub mod rag {
    pub const COLLECTION: &str = "kb_collection";
    pub const TOP_K: usize = 2;
    pub const OLLAMA_URL: &str = "http://localhost:11434";
    pub const QUERY_TIMEOUT_SECS: u64 = 30;
    pub const CHUNK_WINDOW: usize = 100;
    pub const CHUNK_OVERLAP: usize = 40;
}

pub mod ui {
    pub const CONFIG_DIR_NAME: &str = ".gitmate";
}
