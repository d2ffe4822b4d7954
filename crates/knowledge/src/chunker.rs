//! Word-window chunker.
//!
//! Splits text on whitespace into windows of `chunk_size` words. Consecutive
//! windows share `overlap` words, so the window start advances by
//! `chunk_size - overlap`. The last window always ends at the final word.

use supportdesk_core::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkerConfig {
    /// Build a chunker. Rejects a zero size and any overlap that would stop
    /// the window from advancing.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, Error> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be > 0"));
        }
        if overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Words the window advances per chunk.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split `text` into chunks of space-joined words.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += self.stride();
        }

        chunks
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 120,
        }
    }
}
