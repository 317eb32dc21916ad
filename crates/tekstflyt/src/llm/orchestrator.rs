//! Ordered provider chain for document drafting.
//!
//! Providers are tried in sequence, each under its own timeout. The first
//! success wins and is tagged with `<provider>:<model>` provenance; when every
//! provider fails the caller gets the accumulated failure report.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{CompletionRequest, GenerationConfig, LLMProvider};
use crate::types::DocumentType;

/// Subject used in document names when the summary call fails.
pub const FALLBACK_SUBJECT: &str = "diverse";

const SUMMARY_MAX_WORDS: usize = 5;
const SUMMARY_INPUT_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    /// `<provider>:<model-name>`
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("text generation failed on every provider: {}", format_failures(.failures))]
    Exhausted { failures: Vec<ProviderFailure> },
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.provider, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct GenerationOrchestrator {
    providers: Vec<Arc<dyn LLMProvider>>,
    summarizer: Option<Arc<dyn LLMProvider>>,
    config: GenerationConfig,
    attempt_timeout: Duration,
    summary_timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(providers: Vec<Arc<dyn LLMProvider>>) -> Self {
        Self {
            providers,
            summarizer: None,
            config: GenerationConfig::default(),
            attempt_timeout: Duration::from_secs(120),
            summary_timeout: Duration::from_secs(30),
        }
    }

    /// Dedicated (usually smaller) model for subject summaries. Without one
    /// the first provider of the chain is used.
    pub fn with_summarizer(mut self, summarizer: Option<Arc<dyn LLMProvider>>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timeouts(mut self, attempt: Duration, summary: Duration) -> Self {
        self.attempt_timeout = attempt;
        self.summary_timeout = summary;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<GeneratedText, GenerationError> {
        let request = CompletionRequest {
            system: Some(system_prompt.to_string()),
            prompt: user_prompt.to_string(),
            config: self.config.clone(),
        };

        let mut failures = Vec::new();
        for provider in &self.providers {
            let info = provider.info();
            let outcome = tokio::time::timeout(self.attempt_timeout, provider.complete(&request)).await;

            let reason = match outcome {
                Ok(Ok(completion)) => {
                    let model_id = format!("{}:{}", info.name, completion.model);
                    tracing::info!(model_id = %model_id, chars = completion.text.len(), "Generated document text");
                    return Ok(GeneratedText {
                        text: completion.text,
                        model_id,
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {}s", self.attempt_timeout.as_secs()),
            };

            tracing::warn!(provider = %info.name, model = %info.model, reason = %reason, "Provider failed, trying next");
            failures.push(ProviderFailure {
                provider: format!("{}:{}", info.name, info.model),
                reason,
            });
        }

        tracing::error!(attempts = failures.len(), "All text-generation providers failed");
        Err(GenerationError::Exhausted { failures })
    }

    /// A topical summary of at most five words, used to compose the document
    /// name. Never fails: any error degrades to [`FALLBACK_SUBJECT`].
    pub async fn summarize_subject(&self, document_type: DocumentType, text: &str) -> String {
        let Some(provider) = self.summarizer.as_ref().or_else(|| self.providers.first()) else {
            return FALLBACK_SUBJECT.to_string();
        };

        let excerpt: String = text.chars().take(SUMMARY_INPUT_CHARS).collect();
        let request = CompletionRequest {
            system: None,
            prompt: format!("{}\n\nTekst:\n{}", summary_question(document_type), excerpt),
            config: GenerationConfig {
                max_tokens: 50,
                temperature: None,
            },
        };

        match tokio::time::timeout(self.summary_timeout, provider.complete(&request)).await {
            Ok(Ok(completion)) => {
                let subject = clean_subject(&completion.text);
                if subject.is_empty() {
                    FALLBACK_SUBJECT.to_string()
                } else {
                    subject
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Could not generate document subject, using fallback");
                FALLBACK_SUBJECT.to_string()
            }
            Err(_) => {
                tracing::warn!("Document subject request timed out, using fallback");
                FALLBACK_SUBJECT.to_string()
            }
        }
    }
}

fn summary_question(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Offer | DocumentType::Rebranding => {
            "Hva er produktet/tjenesten det gis tilbud på? Svar med maks 5 ord."
        }
        DocumentType::Letter | DocumentType::LetterReply => {
            "Hva handler brevet om? Svar med maks 5 ord."
        }
        DocumentType::Note => "Hva handler notatet om? Svar med maks 5 ord.",
        DocumentType::ServiceAgreement => {
            "Hva slags anlegg gjelder serviceavtalen? Svar med maks 5 ord."
        }
    }
}

fn clean_subject(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or("");
    let words: Vec<&str> = first_line
        .split_whitespace()
        .take(SUMMARY_MAX_WORDS)
        .collect();
    words
        .join(" ")
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim_end_matches('.')
        .trim()
        .to_string()
}
