use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{DocumentStore, KnowledgeStore};
use crate::error::DocumentError;
use crate::types::{
    Document, DocumentId, DocumentPatch, DocumentStatus, GeneratedFiles, KnowledgeChunk,
    KnowledgeDocument, KnowledgeDocumentId, KnowledgeDocumentMeta, KnowledgeDocumentSummary,
    NewDocument,
};

#[derive(Default)]
struct DocumentTable {
    rows: BTreeMap<DocumentId, Document>,
    next_id: DocumentId,
}

/// Document rows behind a single write lock, which makes every CAS atomic.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    table: RwLock<DocumentTable>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner-side creation. Documents always start as drafts.
    pub fn insert(&self, new: NewDocument) -> Document {
        let mut table = self.table.write();
        table.next_id += 1;
        let now = Utc::now();
        let doc = Document {
            id: table.next_id,
            user_id: new.user_id,
            document_type: new.document_type,
            document_name: new
                .document_name
                .unwrap_or_else(|| new.document_type.label().to_string()),
            status: DocumentStatus::Draft,
            recipient_name: new.recipient_name,
            recipient_address: new.recipient_address,
            recipient_postal_code: new.recipient_postal_code,
            recipient_city: new.recipient_city,
            recipient_person: new.recipient_person,
            recipient_phone: new.recipient_phone,
            recipient_email: new.recipient_email,
            customer_type: new.customer_type,
            price_product: new.price_product,
            price_installation: new.price_installation,
            document_text: new.document_text,
            ai_model: None,
            ai_prompt: new.ai_prompt,
            file_path_attachment: new.file_path_attachment,
            file_path_word: None,
            file_path_word_signed: None,
            file_path_pdf: None,
            file_path_pdf_signed: None,
            created_at: now,
            updated_at: now,
            finalized_at: None,
        };
        table.rows.insert(doc.id, doc.clone());
        doc
    }

    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, id: DocumentId) -> Result<Option<Document>, DocumentError> {
        Ok(self.table.read().rows.get(&id).cloned())
    }

    async fn update(
        &self,
        id: DocumentId,
        patch: &DocumentPatch,
    ) -> Result<Document, DocumentError> {
        let mut table = self.table.write();
        let doc = table.rows.get_mut(&id).ok_or(DocumentError::NotFound(id))?;
        if doc.status == DocumentStatus::Finalized {
            return Err(DocumentError::AlreadyFinalized { id });
        }
        if !patch.is_empty() {
            patch.apply_to(doc);
            doc.updated_at = Utc::now();
        }
        Ok(doc.clone())
    }

    async fn try_transition(
        &self,
        id: DocumentId,
        to: DocumentStatus,
        allowed_from: &[DocumentStatus],
    ) -> Result<bool, DocumentError> {
        let mut table = self.table.write();
        let doc = table.rows.get_mut(&id).ok_or(DocumentError::NotFound(id))?;
        if !allowed_from.contains(&doc.status) {
            return Ok(false);
        }
        doc.status = to;
        doc.updated_at = Utc::now();
        Ok(true)
    }

    async fn persist_finalized(
        &self,
        id: DocumentId,
        files: &GeneratedFiles,
    ) -> Result<Document, DocumentError> {
        let mut table = self.table.write();
        let doc = table.rows.get_mut(&id).ok_or(DocumentError::NotFound(id))?;
        match doc.status {
            DocumentStatus::Finalizing => {}
            DocumentStatus::Finalized => return Err(DocumentError::AlreadyFinalized { id }),
            status => return Err(DocumentError::Conflict { id, status }),
        }
        let now = Utc::now();
        doc.file_path_word = Some(files.word.clone());
        doc.file_path_word_signed = Some(files.word_signed.clone());
        doc.file_path_pdf = files.pdf.clone();
        doc.file_path_pdf_signed = files.pdf_signed.clone();
        doc.status = DocumentStatus::Finalized;
        doc.finalized_at = Some(now);
        doc.updated_at = now;
        Ok(doc.clone())
    }
}

#[derive(Default)]
struct KnowledgeTables {
    documents: BTreeMap<KnowledgeDocumentId, KnowledgeDocument>,
    chunks: Vec<KnowledgeChunk>,
    next_document_id: KnowledgeDocumentId,
    next_chunk_id: u64,
}

#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    tables: RwLock<KnowledgeTables>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn create_document(&self, meta: KnowledgeDocumentMeta) -> Result<KnowledgeDocument> {
        let mut tables = self.tables.write();
        tables.next_document_id += 1;
        let document = KnowledgeDocument {
            id: tables.next_document_id,
            filename: meta.filename,
            category: meta.category,
            description: meta.description,
            uploaded_by: meta.uploaded_by,
            uploaded_at: Utc::now(),
        };
        tables.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: KnowledgeDocumentId) -> Result<Option<KnowledgeDocument>> {
        Ok(self.tables.read().documents.get(&id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<KnowledgeDocumentSummary>> {
        let tables = self.tables.read();
        let mut summaries: Vec<KnowledgeDocumentSummary> = tables
            .documents
            .values()
            .map(|document| KnowledgeDocumentSummary {
                chunk_count: tables
                    .chunks
                    .iter()
                    .filter(|c| c.document_id == document.id)
                    .count(),
                document: document.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.document
                .uploaded_at
                .cmp(&a.document.uploaded_at)
                .then(b.document.id.cmp(&a.document.id))
        });
        Ok(summaries)
    }

    async fn chunks_of(&self, id: KnowledgeDocumentId) -> Result<Vec<KnowledgeChunk>> {
        let tables = self.tables.read();
        let mut chunks: Vec<KnowledgeChunk> = tables
            .chunks
            .iter()
            .filter(|c| c.document_id == id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn add_chunk(
        &self,
        document_id: KnowledgeDocumentId,
        chunk_index: usize,
        content: String,
        embedding: Vec<f32>,
        metadata: Option<serde_json::Value>,
    ) -> Result<KnowledgeChunk> {
        let mut tables = self.tables.write();
        if !tables.documents.contains_key(&document_id) {
            return Err(anyhow!("knowledge document {} does not exist", document_id));
        }
        if tables
            .chunks
            .iter()
            .any(|c| c.document_id == document_id && c.chunk_index == chunk_index)
        {
            return Err(anyhow!(
                "chunk {} already exists for knowledge document {}",
                chunk_index,
                document_id
            ));
        }
        tables.next_chunk_id += 1;
        let chunk = KnowledgeChunk {
            id: tables.next_chunk_id,
            document_id,
            chunk_index,
            content,
            embedding,
            metadata,
        };
        tables.chunks.push(chunk.clone());
        Ok(chunk)
    }

    async fn delete_document(&self, id: KnowledgeDocumentId) -> Result<bool> {
        let mut tables = self.tables.write();
        let existed = tables.documents.remove(&id).is_some();
        tables.chunks.retain(|c| c.document_id != id);
        Ok(existed)
    }

    async fn all_chunks(&self) -> Result<Vec<KnowledgeChunk>> {
        Ok(self.tables.read().chunks.clone())
    }
}
