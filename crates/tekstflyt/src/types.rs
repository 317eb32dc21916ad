use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub type DocumentId = i64;
pub type KnowledgeDocumentId = i64;

/// The fixed set of document kinds. Wire codes are the Norwegian codes the
/// frontend and database use; the English names are accepted on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "tilbud")]
    Offer,
    #[serde(rename = "brev")]
    Letter,
    #[serde(rename = "notat")]
    Note,
    #[serde(rename = "omprofilering")]
    Rebranding,
    #[serde(rename = "svar_paa_brev")]
    LetterReply,
    #[serde(rename = "serviceavtale")]
    ServiceAgreement,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        Self::Offer,
        Self::Letter,
        Self::Note,
        Self::Rebranding,
        Self::LetterReply,
        Self::ServiceAgreement,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Offer => "tilbud",
            Self::Letter => "brev",
            Self::Note => "notat",
            Self::Rebranding => "omprofilering",
            Self::LetterReply => "svar_paa_brev",
            Self::ServiceAgreement => "serviceavtale",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Offer => "Tilbud",
            Self::Letter => "Brev",
            Self::Note => "Notat",
            Self::Rebranding => "Omprofilering",
            Self::LetterReply => "Svar på brev",
            Self::ServiceAgreement => "Serviceavtale",
        }
    }

    /// Types whose prompt includes the extracted attachment text.
    pub fn uses_attachment(&self) -> bool {
        matches!(self, Self::Rebranding | Self::LetterReply)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tilbud" | "offer" => Ok(Self::Offer),
            "brev" | "letter" => Ok(Self::Letter),
            "notat" | "note" => Ok(Self::Note),
            "omprofilering" | "rebranding" => Ok(Self::Rebranding),
            "svar_paa_brev" | "letter-reply" | "letter_reply" => Ok(Self::LetterReply),
            "serviceavtale" | "service-agreement" | "service_agreement" => {
                Ok(Self::ServiceAgreement)
            }
            other => Err(format!("unknown document type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Generating,
    Finalizing,
    Finalized,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generating => "generating",
            Self::Finalizing => "finalizing",
            Self::Finalized => "finalized",
        }
    }

    /// Transient states only live for the duration of one guarded operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Generating | Self::Finalizing)
    }

    /// The status machine's edge table. `Finalized` is terminal.
    pub fn can_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (from, to),
            (Draft, Generating)
                | (Draft, Finalizing)
                | (Generating, Draft)
                | (Finalizing, Draft)
                | (Finalizing, Finalized)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Business,
    Private,
}

impl CustomerType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Business => "Bedrift",
            Self::Private => "Privat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub user_id: i64,
    pub document_type: DocumentType,
    pub document_name: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub recipient_address: Option<String>,
    #[serde(default)]
    pub recipient_postal_code: Option<String>,
    #[serde(default)]
    pub recipient_city: Option<String>,
    #[serde(default)]
    pub recipient_person: Option<String>,
    #[serde(default)]
    pub recipient_phone: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    pub customer_type: Option<CustomerType>,
    #[serde(default)]
    pub price_product: Option<Decimal>,
    #[serde(default)]
    pub price_installation: Option<Decimal>,
    #[serde(default)]
    pub document_text: Option<String>,
    #[serde(default)]
    pub ai_model: Option<String>,
    #[serde(default)]
    pub ai_prompt: Option<String>,
    #[serde(default)]
    pub file_path_attachment: Option<PathBuf>,
    #[serde(default)]
    pub file_path_word: Option<PathBuf>,
    #[serde(default)]
    pub file_path_word_signed: Option<PathBuf>,
    #[serde(default)]
    pub file_path_pdf: Option<PathBuf>,
    #[serde(default)]
    pub file_path_pdf_signed: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn has_text(&self) -> bool {
        self.document_text
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Fields supplied by the document owner when a draft is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub user_id: i64,
    pub document_type: DocumentType,
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub recipient_address: Option<String>,
    #[serde(default)]
    pub recipient_postal_code: Option<String>,
    #[serde(default)]
    pub recipient_city: Option<String>,
    #[serde(default)]
    pub recipient_person: Option<String>,
    #[serde(default)]
    pub recipient_phone: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    pub customer_type: Option<CustomerType>,
    #[serde(default)]
    pub price_product: Option<Decimal>,
    #[serde(default)]
    pub price_installation: Option<Decimal>,
    #[serde(default)]
    pub document_text: Option<String>,
    #[serde(default)]
    pub ai_prompt: Option<String>,
    #[serde(default)]
    pub file_path_attachment: Option<PathBuf>,
}

impl NewDocument {
    pub fn new(user_id: i64, document_type: DocumentType) -> Self {
        Self {
            user_id,
            document_type,
            document_name: None,
            recipient_name: None,
            recipient_address: None,
            recipient_postal_code: None,
            recipient_city: None,
            recipient_person: None,
            recipient_phone: None,
            recipient_email: None,
            customer_type: None,
            price_product: None,
            price_installation: None,
            document_text: None,
            ai_prompt: None,
            file_path_attachment: None,
        }
    }
}

/// Fields the core may write outside the status machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.document_text.is_none()
            && self.document_name.is_none()
            && self.ai_model.is_none()
            && self.ai_prompt.is_none()
    }

    pub fn apply_to(&self, doc: &mut Document) {
        if let Some(text) = &self.document_text {
            doc.document_text = Some(text.clone());
        }
        if let Some(name) = &self.document_name {
            doc.document_name = name.clone();
        }
        if let Some(model) = &self.ai_model {
            doc.ai_model = Some(model.clone());
        }
        if let Some(prompt) = &self.ai_prompt {
            doc.ai_prompt = Some(prompt.clone());
        }
    }
}

/// The four artifacts of a finalized document. Word files are mandatory, PDFs
/// are absent when conversion was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFiles {
    pub word: PathBuf,
    pub word_signed: PathBuf,
    pub pdf: Option<PathBuf>,
    pub pdf_signed: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: KnowledgeDocumentId,
    pub filename: String,
    pub category: String,
    pub description: String,
    pub uploaded_by: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocumentMeta {
    pub filename: String,
    pub category: String,
    pub description: String,
    pub uploaded_by: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocumentSummary {
    #[serde(flatten)]
    pub document: KnowledgeDocument,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Store-wide insertion sequence; breaks similarity ties.
    pub id: u64,
    pub document_id: KnowledgeDocumentId,
    pub chunk_index: usize,
    pub content: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub filename: String,
    pub category: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: KnowledgeDocumentId,
    pub chunk_count: usize,
    /// Windows dropped because their embedding or storage failed.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_accepts_codes_and_english_names() {
        assert_eq!("tilbud".parse::<DocumentType>(), Ok(DocumentType::Offer));
        assert_eq!("letter-reply".parse::<DocumentType>(), Ok(DocumentType::LetterReply));
        assert_eq!(
            "Serviceavtale".parse::<DocumentType>(),
            Ok(DocumentType::ServiceAgreement)
        );
        assert!("faktura".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_type_serde_uses_wire_codes() {
        let json = serde_json::to_string(&DocumentType::LetterReply).unwrap();
        assert_eq!(json, "\"svar_paa_brev\"");
        let back: DocumentType = serde_json::from_str("\"omprofilering\"").unwrap();
        assert_eq!(back, DocumentType::Rebranding);
    }

    #[test]
    fn test_finalized_is_terminal() {
        for to in [
            DocumentStatus::Draft,
            DocumentStatus::Generating,
            DocumentStatus::Finalizing,
            DocumentStatus::Finalized,
        ] {
            assert!(!DocumentStatus::can_transition(DocumentStatus::Finalized, to));
        }
        assert!(!DocumentStatus::can_transition(
            DocumentStatus::Generating,
            DocumentStatus::Finalized
        ));
        assert!(DocumentStatus::can_transition(
            DocumentStatus::Finalizing,
            DocumentStatus::Finalized
        ));
    }

    #[test]
    fn test_prices_serialize_as_strings() {
        let price: Decimal = "1500.00".parse().unwrap();
        let json = serde_json::to_value(price).unwrap();
        assert_eq!(json, serde_json::json!("1500.00"));
    }
}
