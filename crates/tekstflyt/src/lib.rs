//! Tekstflyt: business documents from structured requests. Drafts are written
//! by a language model grounded in a knowledge base, then rendered into
//! branded Word files and converted to PDF.

pub mod config;
pub mod convert;
pub mod embeddings;
pub mod error;
pub mod knowledge;
pub mod lifecycle;
pub mod llm;
pub mod naming;
pub mod processing;
pub mod rag;
pub mod render;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use config::ServiceConfig;
pub use error::DocumentError;
pub use service::DocumentService;
pub use types::{
    CustomerType, Document, DocumentId, DocumentPatch, DocumentStatus, DocumentType,
    GeneratedFiles, IngestReport, SearchHit,
};

pub use llm::{ApiProvider, GeneratedText, GenerationError, GenerationOrchestrator};
pub use render::{RenderedDocument, TemplateRenderer};

pub use anyhow::{Error, Result};
