pub mod chunker;
pub mod parser;

pub use chunker::{ChunkResult, TextChunker};
pub use parser::AttachmentExtractor;
