use thiserror::Error;

use crate::llm::GenerationError;
use crate::types::{DocumentId, DocumentStatus};

/// Errors reported across the service boundary.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("document {id} is already finalized")]
    AlreadyFinalized { id: DocumentId },

    #[error("document {id} is busy ({status})")]
    Conflict { id: DocumentId, status: DocumentStatus },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("could not produce document files: {0}")]
    Render(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DocumentError {
    /// HTTP-equivalent status for the transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::AlreadyFinalized { .. } => 400,
            Self::Conflict { .. } => 409,
            Self::Generation(_) => 502,
            Self::Render(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
