//! Persistence seams. The document row and the knowledge index are owned by
//! external collaborators; the core only talks to them through these traits.

pub mod memory;

pub use memory::{InMemoryDocumentStore, InMemoryKnowledgeStore};

use anyhow::Result;
use async_trait::async_trait;

use crate::error::DocumentError;
use crate::types::{
    Document, DocumentId, DocumentPatch, DocumentStatus, GeneratedFiles, KnowledgeChunk,
    KnowledgeDocument, KnowledgeDocumentId, KnowledgeDocumentMeta, KnowledgeDocumentSummary,
};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, id: DocumentId) -> Result<Option<Document>, DocumentError>;

    /// Write non-status fields. Finalized documents are immutable.
    async fn update(&self, id: DocumentId, patch: &DocumentPatch)
        -> Result<Document, DocumentError>;

    /// Atomic compare-and-set on `status`: succeeds only when the current
    /// status is in `allowed_from`. A `false` return has no side effects.
    async fn try_transition(
        &self,
        id: DocumentId,
        to: DocumentStatus,
        allowed_from: &[DocumentStatus],
    ) -> Result<bool, DocumentError>;

    /// Set all file references, `finalized_at` and status `finalized` in one
    /// step. Only valid while the document is `finalizing`.
    async fn persist_finalized(
        &self,
        id: DocumentId,
        files: &GeneratedFiles,
    ) -> Result<Document, DocumentError>;
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn create_document(&self, meta: KnowledgeDocumentMeta) -> Result<KnowledgeDocument>;

    async fn get_document(&self, id: KnowledgeDocumentId) -> Result<Option<KnowledgeDocument>>;

    /// Newest first, with chunk counts.
    async fn list_documents(&self) -> Result<Vec<KnowledgeDocumentSummary>>;

    /// Chunks of one document ordered by `chunk_index`.
    async fn chunks_of(&self, id: KnowledgeDocumentId) -> Result<Vec<KnowledgeChunk>>;

    async fn add_chunk(
        &self,
        document_id: KnowledgeDocumentId,
        chunk_index: usize,
        content: String,
        embedding: Vec<f32>,
        metadata: Option<serde_json::Value>,
    ) -> Result<KnowledgeChunk>;

    /// Removes the document and its chunks. Returns `false` if it did not exist.
    async fn delete_document(&self, id: KnowledgeDocumentId) -> Result<bool>;

    /// Every chunk in insertion order.
    async fn all_chunks(&self) -> Result<Vec<KnowledgeChunk>>;
}
