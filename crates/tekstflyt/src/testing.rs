//! Fakes shared by the unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::path::Path;
use std::time::Duration;

use docx_rs::{Docx, Paragraph, Run};

use crate::config::{ServiceConfig, TemplateConfig};
use crate::embeddings::EmbeddingModel;
use crate::llm::{Completion, CompletionRequest, LLMProvider, ProviderInfo};

pub struct ScriptedProvider {
    name: String,
    model: String,
    reply: Result<String, String>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn ok(name: &str, model: &str, text: &str) -> Arc<Self> {
        Arc::new(Self::new(name, model, Ok(text.to_string())))
    }

    pub fn failing(name: &str, model: &str, reason: &str) -> Arc<Self> {
        Arc::new(Self::new(name, model, Err(reason.to_string())))
    }

    fn new(name: &str, model: &str, reply: Result<String, String>) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            reply,
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock() = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok(text) => Ok(Completion {
                text: text.clone(),
                model: self.model.clone(),
            }),
            Err(reason) => Err(anyhow!("{}", reason)),
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            model: self.model.clone(),
        }
    }
}

/// Bag-of-words hashing embedder. Texts containing `FAIL_EMBED` fail.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("FAIL_EMBED") {
            return Err(anyhow!("embedding service rejected input"));
        }
        let mut vector = vec![0.0f32; self.dimension];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn write_template(path: &Path, paragraphs: Vec<Paragraph>) {
    let docx = paragraphs
        .into_iter()
        .fold(Docx::new(), |docx, p| docx.add_paragraph(p));
    let mut bytes = Vec::new();
    docx.build()
        .pack(&mut std::io::Cursor::new(&mut bytes))
        .unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Offer template with split tokens and a body slot; letter and note
/// templates without one.
pub fn template_config(dir: &Path) -> TemplateConfig {
    write_template(
        &dir.join("offer_template.docx"),
        vec![
            Paragraph::new()
                .add_run(Run::new().add_text("Tilbud til {{mottaker_"))
                .add_run(Run::new().add_text("navn}}").bold()),
            Paragraph::new().add_run(Run::new().add_text("Pris: {{pris_produkt}}")),
            Paragraph::new().add_run(Run::new().add_text("{{innhold}}")),
            Paragraph::new().add_run(Run::new().add_text("Gjelder: {{tittel}}")),
        ],
    );
    for name in ["letter_template.docx", "note_template.docx"] {
        write_template(
            &dir.join(name),
            vec![Paragraph::new().add_run(Run::new().add_text("{{dato}}"))],
        );
    }
    let mut config = ServiceConfig::default().templates;
    config.dir = dir.to_path_buf();
    config
}
