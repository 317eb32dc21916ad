//! Knowledge base: chunked, embedded passages with brute-force nearest
//! neighbour search.

use anyhow::{anyhow, Result};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::embeddings::{cosine_similarity, EmbeddingModel};
use crate::processing::{AttachmentExtractor, TextChunker};
use crate::storage::KnowledgeStore;
use crate::types::{
    IngestReport, KnowledgeChunk, KnowledgeDocument, KnowledgeDocumentId, KnowledgeDocumentMeta,
    KnowledgeDocumentSummary, SearchHit,
};

pub struct RetrievalIndex {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingModel>,
    chunker: TextChunker,
    extractor: Arc<AttachmentExtractor>,
}

impl RetrievalIndex {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingModel>,
        chunker: TextChunker,
        extractor: Arc<AttachmentExtractor>,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            extractor,
        }
    }

    /// Chunk, embed and store `raw_text` under a new knowledge document.
    /// A chunk whose embedding or storage fails is logged and skipped; its index stays
    /// unused so surviving chunks keep their position in the source text.
    pub async fn ingest(&self, raw_text: &str, meta: KnowledgeDocumentMeta) -> Result<IngestReport> {
        let document = self.store.create_document(meta).await?;
        let chunks = self.chunker.chunk(raw_text);
        let expected_dimension = self.embedder.dimension();

        let mut stored = 0;
        let mut skipped = 0;
        for chunk in chunks {
            let embedding = match self.embedder.embed_document(&chunk.text).await {
                Ok(v) if v.len() == expected_dimension => v,
                Ok(v) => {
                    tracing::warn!(
                        document_id = document.id,
                        chunk_index = chunk.index,
                        dimension = v.len(),
                        expected = expected_dimension,
                        "Embedding has wrong dimension, skipping chunk"
                    );
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(document_id = document.id, chunk_index = chunk.index, error = %e, "Failed to embed chunk, skipping");
                    skipped += 1;
                    continue;
                }
            };

            let added = self
                .store
                .add_chunk(
                    document.id,
                    chunk.index,
                    chunk.text,
                    embedding,
                    Some(json!({ "page_approx": chunk.index })),
                )
                .await;
            match added {
                Ok(_) => stored += 1,
                Err(e) => {
                    tracing::warn!(document_id = document.id, chunk_index = chunk.index, error = %e, "Failed to store chunk, skipping");
                    skipped += 1;
                }
            }
        }

        tracing::info!(
            document_id = document.id,
            filename = %document.filename,
            chunks = stored,
            skipped,
            "Knowledge document ingested"
        );

        Ok(IngestReport {
            document_id: document.id,
            chunk_count: stored,
            skipped,
        })
    }

    pub async fn ingest_pdf(&self, bytes: Vec<u8>, meta: KnowledgeDocumentMeta) -> Result<IngestReport> {
        let text = self.extractor.extract_knowledge_pdf(bytes).await?;
        if text.trim().is_empty() {
            return Err(anyhow!("PDF '{}' contains no extractable text", meta.filename));
        }
        self.ingest(&text, meta).await
    }

    /// Top-`k` passages by cosine similarity, ties in insertion order.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed_query(query).await?;

        let mut scored: Vec<(f32, KnowledgeChunk)> = self
            .store
            .all_chunks()
            .await?
            .into_iter()
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        scored.truncate(k);

        let mut documents: HashMap<KnowledgeDocumentId, Option<KnowledgeDocument>> = HashMap::new();
        let mut hits = Vec::with_capacity(scored.len());
        for (similarity, chunk) in scored {
            if !documents.contains_key(&chunk.document_id) {
                let document = self.store.get_document(chunk.document_id).await?;
                documents.insert(chunk.document_id, document);
            }
            let (filename, category) = match documents.get(&chunk.document_id) {
                Some(Some(d)) => (d.filename.clone(), d.category.clone()),
                _ => (String::new(), String::new()),
            };
            hits.push(SearchHit {
                content: chunk.content,
                metadata: chunk.metadata,
                filename,
                category,
                similarity,
            });
        }

        tracing::debug!(query_len = query.len(), hits = hits.len(), "Knowledge search");
        Ok(hits)
    }

    pub async fn list(&self) -> Result<Vec<KnowledgeDocumentSummary>> {
        self.store.list_documents().await
    }

    pub async fn chunks(&self, id: KnowledgeDocumentId) -> Result<Vec<KnowledgeChunk>> {
        self.store.chunks_of(id).await
    }

    pub async fn delete(&self, id: KnowledgeDocumentId) -> Result<bool> {
        let deleted = self.store.delete_document(id).await?;
        if deleted {
            tracing::info!(document_id = id, "Knowledge document deleted");
        }
        Ok(deleted)
    }
}
