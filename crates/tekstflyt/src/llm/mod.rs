//! LLM Module - external text-generation providers and the fallback chain
//! that drafts document bodies.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod external;
pub mod orchestrator;

pub use external::ExternalProvider;
pub use orchestrator::{GeneratedText, GenerationError, GenerationOrchestrator, ProviderFailure};

use crate::config::{GenerationSettings, ProviderSettings};

/// External API providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    Anthropic,
    OpenAI,
}

impl ApiProvider {
    /// Provenance prefix used in `<provider>:<model>` tags.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAI => "https://api.openai.com",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: None,
        }
    }
}

/// One synchronous completion request: an optional system prompt and a
/// single user turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Model name as reported by the API (falls back to the configured one).
    pub model: String,
}

/// Provider information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
}

/// Core trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    fn info(&self) -> ProviderInfo;
}

/// Build one provider from settings. Returns `None` when no API key is
/// available so the chain can be assembled from whatever is configured.
pub fn provider_from_settings(
    settings: &ProviderSettings,
) -> Result<Option<Arc<dyn LLMProvider>>> {
    let Some(api_key) = settings
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
    else {
        tracing::warn!(
            provider = %settings.provider,
            model = %settings.model,
            "No API key configured, provider disabled"
        );
        return Ok(None);
    };

    let provider = ExternalProvider::new(
        settings.provider,
        api_key,
        settings.model.clone(),
        settings.base_url.clone(),
    )?;
    Ok(Some(Arc::new(provider)))
}

/// Build the orchestrator from configuration: primary first, then fallback.
pub fn orchestrator_from_settings(settings: &GenerationSettings) -> Result<GenerationOrchestrator> {
    let mut providers = Vec::new();
    if let Some(primary) = provider_from_settings(&settings.primary)? {
        providers.push(primary);
    }
    if let Some(fallback) = &settings.fallback {
        if let Some(provider) = provider_from_settings(fallback)? {
            providers.push(provider);
        }
    }
    if providers.is_empty() {
        return Err(anyhow::anyhow!(
            "No text-generation provider is configured (set {} or {})",
            ApiProvider::Anthropic.api_key_env(),
            ApiProvider::OpenAI.api_key_env()
        ));
    }

    let summarizer = match &settings.summary {
        Some(summary) => provider_from_settings(summary)?,
        None => None,
    };

    Ok(GenerationOrchestrator::new(providers)
        .with_summarizer(summarizer)
        .with_config(GenerationConfig {
            max_tokens: settings.max_tokens,
            temperature: None,
        })
        .with_timeouts(
            std::time::Duration::from_secs(settings.attempt_timeout_secs),
            std::time::Duration::from_secs(settings.summary_timeout_secs),
        ))
}
