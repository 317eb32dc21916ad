use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::ApiProvider;
use crate::types::DocumentType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    /// Where generated Word/PDF files are written.
    pub output_dir: PathBuf,
    pub generation: GenerationSettings,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub prompts: PromptConfig,
    pub templates: TemplateConfig,
    pub signature: SignatureConfig,
    pub conversion: ConversionConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub provider: ApiProvider,
    pub model: String,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub primary: ProviderSettings,
    pub fallback: Option<ProviderSettings>,
    /// Model used for the short subject summary; defaults to the primary.
    pub summary: Option<ProviderSettings>,
    pub max_tokens: usize,
    pub attempt_timeout_secs: u64,
    pub summary_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            primary: ProviderSettings {
                provider: ApiProvider::Anthropic,
                model: "claude-sonnet-4-20250514".to_string(),
                api_key: None,
                base_url: None,
            },
            fallback: Some(ProviderSettings {
                provider: ApiProvider::OpenAI,
                model: "gpt-4o".to_string(),
                api_key: None,
                base_url: None,
            }),
            summary: Some(ProviderSettings {
                provider: ApiProvider::Anthropic,
                model: "claude-haiku-4-5-20251001".to_string(),
                api_key: None,
                base_url: None,
            }),
            max_tokens: 4096,
            attempt_timeout_secs: 120,
            summary_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result count for end-user knowledge search.
    pub default_k: usize,
    /// Passages injected into generation prompts.
    pub prompt_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Prepended to the user instruction to form the retrieval query.
    pub organization_context: String,
    /// Optional directory with `base_system.txt` and `<type-code>.txt`
    /// overriding the built-in prompts.
    #[serde(default)]
    pub override_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub dir: PathBuf,
    pub offer: String,
    pub letter: String,
    pub note: String,
    pub rebranding: String,
    pub letter_reply: String,
    pub service_agreement: String,
}

impl TemplateConfig {
    /// Exhaustive document-type → template file mapping.
    pub fn path_for(&self, document_type: DocumentType) -> PathBuf {
        let file = match document_type {
            DocumentType::Offer => &self.offer,
            DocumentType::Letter => &self.letter,
            DocumentType::Note => &self.note,
            DocumentType::Rebranding => &self.rebranding,
            DocumentType::LetterReply => &self.letter_reply,
            DocumentType::ServiceAgreement => &self.service_agreement,
        };
        self.dir.join(file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub valediction: String,
    pub name: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    /// Image size in EMU (1 cm = 360000 EMU).
    pub image_width_emu: u32,
    pub image_height_emu: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub converter: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub attachment_timeout_secs: u64,
    pub knowledge_timeout_secs: u64,
}

impl ServiceConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if self.chunking.chunk_size == 0 {
            return Err("chunking.chunk_size must be > 0".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        if self.search.default_k == 0 || self.search.prompt_k == 0 {
            return Err("search.default_k and search.prompt_k must be > 0".into());
        }
        if self.generation.max_tokens == 0 {
            return Err("generation.max_tokens must be > 0".into());
        }
        if self.generation.attempt_timeout_secs == 0 || self.conversion.timeout_secs == 0 {
            return Err("timeouts must be > 0".into());
        }
        for document_type in DocumentType::ALL {
            let path = self.templates.path_for(document_type);
            if path.file_name().is_none() {
                return Err(format!("templates: no file configured for {}", document_type));
            }
        }
        Ok(())
    }

    /// Load config from a JSON file. Missing sections and fields take their
    /// default values.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        let config = config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay secrets and paths from the environment.
    pub fn apply_env(mut self) -> Self {
        let anthropic = env_non_empty(ApiProvider::Anthropic.api_key_env());
        let openai = env_non_empty(ApiProvider::OpenAI.api_key_env());
        let key_for = |provider: ApiProvider| match provider {
            ApiProvider::Anthropic => anthropic.clone(),
            ApiProvider::OpenAI => openai.clone(),
        };

        let generation = &mut self.generation;
        for settings in std::iter::once(&mut generation.primary)
            .chain(generation.fallback.as_mut())
            .chain(generation.summary.as_mut())
        {
            if settings.api_key.is_none() {
                settings.api_key = key_for(settings.provider);
            }
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = openai.clone();
        }

        if let Some(dir) = env_non_empty("TEKSTFLYT_DATA_DIR") {
            self.data_dir = PathBuf::from(&dir);
            self.output_dir = PathBuf::from(dir).join("generated");
        }
        if let Some(dir) = env_non_empty("TEKSTFLYT_TEMPLATE_DIR") {
            self.templates.dir = PathBuf::from(dir);
        }
        if let Some(converter) = env_non_empty("TEKSTFLYT_CONVERTER") {
            self.conversion.converter = PathBuf::from(converter);
        }
        self
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tekstflyt")
}

/// `./templates` when present, otherwise under the data directory.
fn default_template_dir() -> PathBuf {
    if Path::new("templates").exists() {
        PathBuf::from("templates")
    } else {
        default_data_dir().join("templates")
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            output_dir: data_dir.join("generated"),
            data_dir,
            generation: GenerationSettings::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            prompts: PromptConfig::default(),
            templates: TemplateConfig::default(),
            signature: SignatureConfig::default(),
            conversion: ConversionConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            api_key: None,
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            prompt_k: 3,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            organization_context: "KVTAS bedriftsinformasjon".to_string(),
            override_dir: None,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: default_template_dir(),
            offer: "offer_template.docx".to_string(),
            letter: "letter_template.docx".to_string(),
            note: "note_template.docx".to_string(),
            rebranding: "letter_template.docx".to_string(),
            letter_reply: "letter_template.docx".to_string(),
            service_agreement: "letter_template.docx".to_string(),
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            valediction: "Med vennlig hilsen".to_string(),
            name: "Trond Ilbråten".to_string(),
            title: "Daglig leder".to_string(),
            company: "Kulde- & Varmepumpeteknikk AS".to_string(),
            image_path: Some(default_template_dir().join("signature.png")),
            image_width_emu: 1_800_000,
            image_height_emu: 720_000,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            converter: PathBuf::from("libreoffice"),
            timeout_secs: 60,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            attachment_timeout_secs: 30,
            knowledge_timeout_secs: 60,
        }
    }
}
