//! The outward operations: drafting text, finalizing into Word/PDF files and
//! administering the knowledge base.

use anyhow::{anyhow, Context};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::convert::FormatConverter;
use crate::embeddings::OpenAIEmbeddings;
use crate::error::DocumentError;
use crate::knowledge::RetrievalIndex;
use crate::lifecycle::LifecycleController;
use crate::llm::{orchestrator_from_settings, GenerationOrchestrator};
use crate::naming::{document_name, file_stem};
use crate::processing::{AttachmentExtractor, TextChunker};
use crate::rag::{PromptAssembler, PromptLibrary};
use crate::render::{TemplateLibrary, TemplateRenderer};
use crate::storage::{DocumentStore, KnowledgeStore};
use crate::types::{
    Document, DocumentId, DocumentPatch, DocumentStatus, GeneratedFiles, IngestReport,
    KnowledgeChunk, KnowledgeDocumentId, KnowledgeDocumentMeta, KnowledgeDocumentSummary,
    SearchHit,
};

pub struct DocumentService {
    lifecycle: LifecycleController,
    assembler: PromptAssembler,
    generator: GenerationOrchestrator,
    renderer: Arc<TemplateRenderer>,
    converter: FormatConverter,
    output_dir: PathBuf,
    index: Option<Arc<RetrievalIndex>>,
    default_k: usize,
}

impl DocumentService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        assembler: PromptAssembler,
        generator: GenerationOrchestrator,
        renderer: TemplateRenderer,
        converter: FormatConverter,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lifecycle: LifecycleController::new(documents),
            assembler,
            generator,
            renderer: Arc::new(renderer),
            converter,
            output_dir: output_dir.into(),
            index: None,
            default_k: 5,
        }
    }

    /// Knowledge search and administration. The same index should be the
    /// one handed to the prompt assembler.
    pub fn with_knowledge(mut self, index: Arc<RetrievalIndex>, default_k: usize) -> Self {
        self.index = Some(index);
        self.default_k = default_k;
        self
    }

    /// Wire every component from configuration. Fails on broken templates,
    /// prompt overrides or a missing generation provider; a missing embedding
    /// key only disables the knowledge base.
    pub fn from_config(
        config: &ServiceConfig,
        documents: Arc<dyn DocumentStore>,
        knowledge: Arc<dyn KnowledgeStore>,
    ) -> anyhow::Result<Self> {
        let extractor = Arc::new(AttachmentExtractor::from_config(&config.extraction));

        let index = match OpenAIEmbeddings::from_config(&config.embedding)? {
            Some(embedder) => Some(Arc::new(RetrievalIndex::new(
                knowledge,
                Arc::new(embedder),
                TextChunker::from_config(&config.chunking),
                extractor.clone(),
            ))),
            None => {
                tracing::warn!("No embedding API key configured, knowledge base disabled");
                None
            }
        };

        let library = PromptLibrary::load(config.prompts.override_dir.as_deref())
            .context("Failed to load prompt library")?;
        let assembler = PromptAssembler::new(
            library,
            extractor,
            index.clone(),
            config.prompts.organization_context.clone(),
            config.search.prompt_k,
        );
        let generator = orchestrator_from_settings(&config.generation)?;
        let templates = TemplateLibrary::load(&config.templates)?;
        let renderer = TemplateRenderer::new(templates, config.signature.clone());

        let service = Self::new(
            documents,
            assembler,
            generator,
            renderer,
            FormatConverter::from_config(&config.conversion),
            config.output_dir.clone(),
        );
        Ok(match index {
            Some(index) => service.with_knowledge(index, config.search.default_k),
            None => service,
        })
    }

    pub fn knowledge(&self) -> Option<&Arc<RetrievalIndex>> {
        self.index.as_ref()
    }

    async fn load(&self, id: DocumentId) -> Result<Document, DocumentError> {
        self.lifecycle
            .store()
            .find(id)
            .await?
            .ok_or(DocumentError::NotFound(id))
    }

    /// Draft the document body with the language model. Without an
    /// instruction the stored `ai_prompt` is reused; a new one is persisted.
    pub async fn generate_text(
        &self,
        id: DocumentId,
        instruction: Option<String>,
    ) -> Result<DocumentPatch, DocumentError> {
        let provided = instruction.filter(|i| !i.trim().is_empty());

        self.lifecycle
            .guarded(id, DocumentStatus::Generating, || async {
                let doc = self.load(id).await?;
                let instruction = provided
                    .clone()
                    .or_else(|| doc.ai_prompt.clone())
                    .unwrap_or_default();

                let prompt = self.assembler.build(&doc, &instruction).await;
                let generated = self.generator.generate(&prompt.system, &prompt.user).await?;
                let subject = self
                    .generator
                    .summarize_subject(doc.document_type, &generated.text)
                    .await;

                let patch = DocumentPatch {
                    document_name: Some(document_name(
                        doc.document_type,
                        Local::now().date_naive(),
                        &subject,
                        doc.recipient_name.as_deref(),
                    )),
                    document_text: Some(generated.text),
                    ai_model: Some(generated.model_id),
                    ai_prompt: provided.clone(),
                };
                self.lifecycle.complete_generation(id, &patch).await?;
                Ok(patch)
            })
            .await
    }

    /// Render the unsigned and signed Word files, convert both to PDF and
    /// mark the document finalized. Missing PDFs do not fail the operation.
    pub async fn finalize(&self, id: DocumentId) -> Result<Document, DocumentError> {
        let doc = self.load(id).await?;
        if doc.status == DocumentStatus::Finalized {
            return Err(DocumentError::AlreadyFinalized { id });
        }
        require_text(&doc)?;

        self.lifecycle
            .guarded(id, DocumentStatus::Finalizing, || async {
                // The text may have been cleared between the check and the transition.
                let doc = self.load(id).await?;
                require_text(&doc)?;
                let files = self.produce_files(doc).await?;
                self.lifecycle.complete_finalize(id, &files).await
            })
            .await
    }

    async fn produce_files(&self, doc: Document) -> Result<GeneratedFiles, DocumentError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                DocumentError::Render(format!("cannot create {}: {}", self.output_dir.display(), e))
            })?;

        let stem = file_stem(&doc.document_name, Local::now().naive_local());
        let word = self.output_dir.join(format!("{}.docx", stem));
        let word_signed = self.output_dir.join(format!("{}_signed.docx", stem));

        let renderer = self.renderer.clone();
        let (unsigned_path, signed_path) = (word.clone(), word_signed.clone());
        let written = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            renderer.render(&doc, false)?.write_to(&unsigned_path)?;
            renderer.render(&doc, true)?.write_to(&signed_path)?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow!("Render task failed: {}", e))
        .and_then(|r| r);

        if let Err(e) = written {
            remove_quietly(&word).await;
            remove_quietly(&word_signed).await;
            return Err(DocumentError::Render(format!("{:#}", e)));
        }

        let pdf = self.converter.to_pdf(&word).await;
        let pdf_signed = self.converter.to_pdf(&word_signed).await;
        if pdf.is_none() || pdf_signed.is_none() {
            tracing::warn!(word = %word.display(), "Finalizing without PDF files");
        }

        Ok(GeneratedFiles {
            word,
            word_signed,
            pdf,
            pdf_signed,
        })
    }

    fn require_index(&self) -> Result<&Arc<RetrievalIndex>, DocumentError> {
        self.index
            .as_ref()
            .ok_or_else(|| DocumentError::Internal(anyhow!("Knowledge base is not configured")))
    }

    pub async fn search_knowledge(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<SearchHit>, DocumentError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DocumentError::Validation("search query is empty".into()));
        }
        let index = self.require_index()?;
        Ok(index.search(query, k.unwrap_or(self.default_k)).await?)
    }

    pub async fn ingest_knowledge_pdf(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        category: &str,
        description: &str,
        uploaded_by: i64,
    ) -> Result<IngestReport, DocumentError> {
        if bytes.is_empty() {
            return Err(DocumentError::Validation("uploaded file is empty".into()));
        }
        let index = self.require_index()?;
        let meta = KnowledgeDocumentMeta {
            filename: filename.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            uploaded_by,
        };
        Ok(index.ingest_pdf(bytes, meta).await?)
    }

    pub async fn list_knowledge(&self) -> Result<Vec<KnowledgeDocumentSummary>, DocumentError> {
        Ok(self.require_index()?.list().await?)
    }

    pub async fn knowledge_chunks(
        &self,
        id: KnowledgeDocumentId,
    ) -> Result<Vec<KnowledgeChunk>, DocumentError> {
        Ok(self.require_index()?.chunks(id).await?)
    }

    pub async fn delete_knowledge(&self, id: KnowledgeDocumentId) -> Result<bool, DocumentError> {
        Ok(self.require_index()?.delete(id).await?)
    }
}

fn require_text(doc: &Document) -> Result<(), DocumentError> {
    if doc.has_text() {
        return Ok(());
    }
    Err(DocumentError::Validation(
        "document has no text to finalize; generate or write it first".into(),
    ))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Could not remove partial output");
        }
    }
}
