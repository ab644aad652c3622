//! Overlapping word-window chunking

use anyhow::{bail, Result};

use crate::constants::rag;

/// Window and overlap, both counted in words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    window: usize,
    overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window: rag::CHUNK_WINDOW,
            overlap: rag::CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        if window == 0 {
            bail!("chunk window must be at least one word");
        }
        if overlap >= window {
            bail!(
                "chunk overlap ({}) must be smaller than the window ({})",
                overlap,
                window
            );
        }
        Ok(Self { window, overlap })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.window - self.overlap
    }
}

/// Split `text` into windows of `window` words, each starting `window - overlap`
/// words after the previous one. The last window is the first one that reaches
/// the end of the text, so no chunk is a suffix of its predecessor.
pub fn chunk_words(text: &str, config: ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + config.window).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += config.step();
    }

    chunks
}
