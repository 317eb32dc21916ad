//! External API providers for LLM
//! Supports the Anthropic Messages API and OpenAI-compatible chat completions

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ApiProvider, Completion, CompletionRequest, LLMProvider, ProviderInfo};

/// External API provider
pub struct ExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl ExternalProvider {
    /// Parse a response body as JSON, returning a clear error if the server returned HTML.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}), service may be down. Response: {}",
                endpoint,
                status,
                preview
            ));
        }
        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }

    /// Create new external provider. Request timeouts are enforced per attempt
    /// by the orchestrator; the client only bounds connection setup.
    pub fn new(
        provider: ApiProvider,
        api_key: String,
        model: String,
        base_url: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        let base_url = base_url
            .unwrap_or_else(|| provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        tracing::info!(provider = %provider, model = %model, "Creating ExternalProvider");

        Ok(Self {
            provider,
            api_key,
            model,
            base_url,
            client,
        })
    }

    fn get_endpoint(&self) -> String {
        match self.provider {
            ApiProvider::Anthropic => format!("{}/v1/messages", self.base_url),
            ApiProvider::OpenAI => format!("{}/v1/chat/completions", self.base_url),
        }
    }

    fn map_send_error(endpoint: &str, e: reqwest::Error) -> anyhow::Error {
        if e.is_timeout() {
            anyhow!("Request to {} timed out", endpoint)
        } else if e.is_connect() {
            anyhow!("Failed to connect to {}: {}", endpoint, e)
        } else {
            anyhow!("Request to {} failed: {}", endpoint, e)
        }
    }

    /// Anthropic generation
    async fn anthropic_complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let endpoint = self.get_endpoint();
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.config.max_tokens,
            "messages": [
                {"role": "user", "content": request.prompt}
            ],
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.config.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&endpoint, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error ({}): {}", status, error));
        }

        let result: AnthropicResponse = Self::parse_json_response(response, &endpoint).await?;
        let text = result
            .content
            .iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(anyhow!("Anthropic returned empty content"));
        }

        Ok(Completion {
            text,
            model: result.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    /// OpenAI-compatible generation
    async fn openai_complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let endpoint = self.get_endpoint();
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.config.max_tokens,
            "stream": false
        });
        if let Some(temperature) = request.config.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&endpoint, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(anyhow!("API error ({}): {}", status, error));
        }

        let result: OpenAIResponse = Self::parse_json_response(response, &endpoint).await?;
        let text = result
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("OpenAI returned empty choices array"))?;

        Ok(Completion {
            text,
            model: result.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[async_trait]
impl LLMProvider for ExternalProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        match self.provider {
            ApiProvider::Anthropic => self.anthropic_complete(request).await,
            ApiProvider::OpenAI => self.openai_complete(request).await,
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.provider.tag().to_string(),
            model: self.model.clone(),
        }
    }
}

/// Response structures
#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
