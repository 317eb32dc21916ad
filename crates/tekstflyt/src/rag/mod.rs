//! Prompt assembly for document drafting: structured document fields,
//! attachment text and knowledge-base passages combined into one
//! system/user prompt pair.

pub mod prompts;

pub use prompts::PromptLibrary;

use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::knowledge::RetrievalIndex;
use crate::processing::AttachmentExtractor;
use crate::types::Document;

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub system: String,
    pub user: String,
}

pub struct PromptAssembler {
    library: PromptLibrary,
    extractor: Arc<AttachmentExtractor>,
    index: Option<Arc<RetrievalIndex>>,
    organization_context: String,
    passages: usize,
}

impl PromptAssembler {
    pub fn new(
        library: PromptLibrary,
        extractor: Arc<AttachmentExtractor>,
        index: Option<Arc<RetrievalIndex>>,
        organization_context: impl Into<String>,
        passages: usize,
    ) -> Self {
        Self {
            library,
            extractor,
            index,
            organization_context: organization_context.into(),
            passages,
        }
    }

    /// Never fails: attachment and knowledge sections are dropped when their
    /// source is unavailable.
    pub async fn build(&self, doc: &Document, instruction: &str) -> AssembledPrompt {
        let mut parts = field_lines(doc);

        if doc.document_type.uses_attachment() {
            match self.attachment_text(doc).await {
                Ok(Some(text)) => parts.push(format!(
                    "\n--- Vedlagt dokument ---\n{}\n--- Slutt vedlegg ---",
                    text.trim()
                )),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(document_id = doc.id, error = %e, "Could not read attachment, continuing without it")
                }
            }
        }

        let query = format!("{} {}", self.organization_context, instruction);
        match self.knowledge_context(query.trim()).await {
            Ok(Some(context)) => parts.push(format!(
                "\n--- Relevant informasjon fra kunnskapsbasen ---\n{}\n--- Slutt kunnskapsbase ---",
                context
            )),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(document_id = doc.id, error = %e, "Knowledge search failed, continuing without context")
            }
        }

        if !instruction.trim().is_empty() {
            parts.push(format!("\nBrukerens instruksjon:\n{}", instruction));
        }

        AssembledPrompt {
            system: self.library.system_prompt(doc.document_type),
            user: parts.join("\n"),
        }
    }

    async fn attachment_text(&self, doc: &Document) -> Result<Option<String>> {
        let Some(path) = doc.file_path_attachment.as_deref() else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(document_id = doc.id, path = %path.display(), "Attachment file is gone");
            return Ok(None);
        }
        let text = self.extractor.extract(path).await?;
        Ok(Some(text).filter(|t| !t.trim().is_empty()))
    }

    /// Top passages joined by blank lines, or `None` when nothing matched or
    /// no index is configured.
    pub async fn knowledge_context(&self, query: &str) -> Result<Option<String>> {
        let Some(index) = &self.index else {
            return Ok(None);
        };
        let hits = index.search(query, self.passages).await?;
        if hits.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            hits.into_iter()
                .map(|h| h.content)
                .collect::<Vec<_>>()
                .join("\n\n"),
        ))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn price(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|p| !p.is_zero())
}

fn field_lines(doc: &Document) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(name) = present(&doc.recipient_name) {
        lines.push(format!("Mottaker: {}", name));
    }
    if let Some(address) = present(&doc.recipient_address) {
        lines.push(format!("Adresse: {}", address));
    }
    if let (Some(postal_code), Some(city)) =
        (present(&doc.recipient_postal_code), present(&doc.recipient_city))
    {
        lines.push(format!("Poststed: {} {}", postal_code, city));
    }
    if let Some(person) = present(&doc.recipient_person) {
        lines.push(format!("Kontaktperson: {}", person));
    }
    if let Some(customer_type) = doc.customer_type {
        lines.push(format!("Kundetype: {}", customer_type.label()));
    }
    if let Some(p) = price(doc.price_product) {
        lines.push(format!("Produktpris: {} kr", p));
    }
    if let Some(p) = price(doc.price_installation) {
        lines.push(format!("Installasjonspris: {} kr", p));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::TextChunker;
    use crate::storage::{InMemoryDocumentStore, InMemoryKnowledgeStore};
    use crate::testing::HashEmbedder;
    use crate::types::{CustomerType, DocumentType, KnowledgeDocumentMeta, NewDocument};
    use std::time::Duration;

    fn extractor() -> Arc<AttachmentExtractor> {
        Arc::new(AttachmentExtractor::new(
            Duration::from_secs(30),
            Duration::from_secs(60),
        ))
    }

    async fn index_with(texts: &[&str]) -> Arc<RetrievalIndex> {
        let index = RetrievalIndex::new(
            Arc::new(InMemoryKnowledgeStore::new()),
            Arc::new(HashEmbedder::new(64)),
            TextChunker::new(1000, 200),
            extractor(),
        );
        for (i, text) in texts.iter().enumerate() {
            index
                .ingest(
                    text,
                    KnowledgeDocumentMeta {
                        filename: format!("{}.pdf", i),
                        category: "firma".into(),
                        description: String::new(),
                        uploaded_by: 1,
                    },
                )
                .await
                .unwrap();
        }
        Arc::new(index)
    }

    fn document(new: NewDocument) -> Document {
        InMemoryDocumentStore::new().insert(new)
    }

    fn offer() -> Document {
        let mut new = NewDocument::new(1, DocumentType::Offer);
        new.recipient_name = Some("Ola Nordmann".into());
        new.recipient_address = Some("Storgata 1".into());
        new.recipient_postal_code = Some("3015".into());
        new.recipient_city = Some("Drammen".into());
        new.customer_type = Some(CustomerType::Private);
        new.price_product = Some("1500.00".parse().unwrap());
        new.price_installation = Some(Decimal::ZERO);
        document(new)
    }

    #[tokio::test]
    async fn test_fields_are_listed_in_fixed_order() {
        let assembler = PromptAssembler::new(
            PromptLibrary::builtin(),
            extractor(),
            None,
            "KVTAS bedriftsinformasjon",
            3,
        );
        let prompt = assembler.build(&offer(), "Tilbud på varmepumpe").await;
        assert_eq!(
            prompt.user,
            "Mottaker: Ola Nordmann\n\
             Adresse: Storgata 1\n\
             Poststed: 3015 Drammen\n\
             Kundetype: Privat\n\
             Produktpris: 1500.00 kr\n\
             \nBrukerens instruksjon:\nTilbud på varmepumpe"
        );
        assert!(prompt.system.contains("Dokumenttype: Tilbud"));
    }

    #[tokio::test]
    async fn test_postal_line_needs_both_parts() {
        let mut new = NewDocument::new(1, DocumentType::Note);
        new.recipient_postal_code = Some("3015".into());
        let assembler =
            PromptAssembler::new(PromptLibrary::builtin(), extractor(), None, "KVTAS", 3);
        let prompt = assembler.build(&document(new), "").await;
        assert_eq!(prompt.user, "");
    }

    #[tokio::test]
    async fn test_knowledge_passages_are_bracketed() {
        let index = index_with(&["KVTAS har 20 års erfaring med varmepumper"]).await;
        let assembler = PromptAssembler::new(
            PromptLibrary::builtin(),
            extractor(),
            Some(index),
            "KVTAS bedriftsinformasjon",
            3,
        );
        let prompt = assembler.build(&offer(), "varmepumper").await;
        assert!(prompt.user.contains(
            "\n--- Relevant informasjon fra kunnskapsbasen ---\nKVTAS har 20 års erfaring med varmepumper\n--- Slutt kunnskapsbase ---"
        ));
        let knowledge_at = prompt.user.find("kunnskapsbasen").unwrap();
        let instruction_at = prompt.user.find("Brukerens instruksjon").unwrap();
        assert!(knowledge_at < instruction_at);
    }

    #[tokio::test]
    async fn test_failed_retrieval_degrades_silently() {
        let index = index_with(&["KVTAS"]).await;
        let assembler = PromptAssembler::new(
            PromptLibrary::builtin(),
            extractor(),
            Some(index),
            "KVTAS",
            3,
        );
        let prompt = assembler.build(&offer(), "FAIL_EMBED").await;
        assert!(!prompt.user.contains("kunnskapsbasen"));
        assert!(prompt.user.ends_with("Brukerens instruksjon:\nFAIL_EMBED"));
    }

    #[tokio::test]
    async fn test_attachment_only_for_reply_and_rebranding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brev.txt");
        std::fs::write(&path, "Vi klager på støy fra utedelen.").unwrap();
        let assembler =
            PromptAssembler::new(PromptLibrary::builtin(), extractor(), None, "KVTAS", 3);

        let mut reply = NewDocument::new(1, DocumentType::LetterReply);
        reply.file_path_attachment = Some(path.clone());
        let prompt = assembler.build(&document(reply), "Svar høflig").await;
        assert!(prompt.user.starts_with(
            "\n--- Vedlagt dokument ---\nVi klager på støy fra utedelen.\n--- Slutt vedlegg ---"
        ));

        let mut letter = NewDocument::new(1, DocumentType::Letter);
        letter.file_path_attachment = Some(path);
        let prompt = assembler.build(&document(letter), "Svar høflig").await;
        assert!(!prompt.user.contains("Vedlagt dokument"));
    }

    #[tokio::test]
    async fn test_unreadable_attachment_is_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skann.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let assembler =
            PromptAssembler::new(PromptLibrary::builtin(), extractor(), None, "KVTAS", 3);

        let mut rebranding = NewDocument::new(1, DocumentType::Rebranding);
        rebranding.file_path_attachment = Some(path);
        let prompt = assembler.build(&document(rebranding), "Skriv om").await;
        assert_eq!(prompt.user, "\nBrukerens instruksjon:\nSkriv om");
    }
}
