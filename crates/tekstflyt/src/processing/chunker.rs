//! Fixed-window character chunking for knowledge ingestion.

use crate::config::ChunkingConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    /// Trimmed window text.
    pub text: String,
    pub index: usize,
    /// Window bounds in characters, end exclusive.
    pub start_offset: usize,
    pub end_offset: usize,
}

pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// `chunk_overlap` must be smaller than `chunk_size`; see
    /// [`crate::config::ServiceConfig::validate`].
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Slide a `chunk_size` window over `text` in steps of `stride()`
    /// characters, stopping once a window reaches the end. Windows that are
    /// blank after trimming are dropped; the survivors are numbered from 0.
    pub fn chunk(&self, text: &str) -> Vec<ChunkResult> {
        // Byte offset of every char, plus the end of the string.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            let window = text[bounds[start]..bounds[end]].trim();

            if !window.is_empty() {
                chunks.push(ChunkResult {
                    text: window.to_string(),
                    index: chunks.len(),
                    start_offset: start,
                    end_offset: end,
                });
            }

            if end >= char_count {
                break;
            }
            start += self.stride();
        }

        chunks
    }
}
