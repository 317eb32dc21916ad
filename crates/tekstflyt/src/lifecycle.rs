//! Document status machine.
//!
//! Every status write goes through [`LifecycleController`]. The only
//! concurrency control is the store's compare-and-set; a lost race is
//! reported as a conflict and never queued or retried.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::DocumentError;
use crate::storage::DocumentStore;
use crate::types::{Document, DocumentId, DocumentPatch, DocumentStatus, GeneratedFiles};

pub struct LifecycleController {
    store: Arc<dyn DocumentStore>,
}

impl LifecycleController {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// CAS entry point. Edges outside the status table are rejected before
    /// the store is touched.
    pub async fn try_transition(
        &self,
        id: DocumentId,
        to: DocumentStatus,
        allowed_from: &[DocumentStatus],
    ) -> Result<bool, DocumentError> {
        if allowed_from.is_empty() {
            return Ok(false);
        }
        if let Some(from) = allowed_from
            .iter()
            .find(|from| !DocumentStatus::can_transition(**from, to))
        {
            return Err(DocumentError::Internal(anyhow::anyhow!(
                "illegal status transition {} -> {}",
                from,
                to
            )));
        }

        let moved = self.store.try_transition(id, to, allowed_from).await?;
        if moved {
            tracing::info!(document_id = id, status = %to, "Document status changed");
        } else {
            tracing::debug!(document_id = id, to = %to, "Status transition refused");
        }
        Ok(moved)
    }

    /// Enter a transient state from `draft`. A lost CAS is classified by
    /// re-reading the status: finalized documents cannot be redone, anything
    /// else is somebody else's operation in flight.
    pub async fn begin(&self, id: DocumentId, transient: DocumentStatus) -> Result<(), DocumentError> {
        if !transient.is_transient() {
            return Err(DocumentError::Internal(anyhow::anyhow!(
                "{} is not a transient status",
                transient
            )));
        }
        if self
            .try_transition(id, transient, &[DocumentStatus::Draft])
            .await?
        {
            return Ok(());
        }

        let current = self
            .store
            .find(id)
            .await?
            .ok_or(DocumentError::NotFound(id))?;
        match current.status {
            DocumentStatus::Finalized => Err(DocumentError::AlreadyFinalized { id }),
            status => {
                tracing::warn!(document_id = id, status = %status, wanted = %transient, "Document is busy");
                Err(DocumentError::Conflict { id, status })
            }
        }
    }

    /// Return a transient document to `draft`.
    pub async fn release(&self, id: DocumentId, from: DocumentStatus) -> Result<bool, DocumentError> {
        self.try_transition(id, DocumentStatus::Draft, &[from]).await
    }

    /// Persist the generated fields, then leave `generating`.
    pub async fn complete_generation(
        &self,
        id: DocumentId,
        patch: &DocumentPatch,
    ) -> Result<Document, DocumentError> {
        let updated = self.store.update(id, patch).await?;
        if !self.release(id, DocumentStatus::Generating).await? {
            return Err(DocumentError::Internal(anyhow::anyhow!(
                "document {} left generating state unexpectedly",
                id
            )));
        }
        Ok(Document {
            status: DocumentStatus::Draft,
            ..updated
        })
    }

    /// `finalizing -> finalized` together with all file references.
    pub async fn complete_finalize(
        &self,
        id: DocumentId,
        files: &GeneratedFiles,
    ) -> Result<Document, DocumentError> {
        let doc = self.store.persist_finalized(id, files).await?;
        tracing::info!(document_id = id, status = %doc.status, "Document status changed");
        Ok(doc)
    }

    /// Run `op` inside a transient state. The operation is responsible for
    /// completing the transition; if it fails or panics the document is put
    /// back to `draft` before the error propagates.
    pub async fn guarded<T, F, Fut>(
        &self,
        id: DocumentId,
        transient: DocumentStatus,
        op: F,
    ) -> Result<T, DocumentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DocumentError>>,
    {
        self.begin(id, transient).await?;

        match AssertUnwindSafe(op()).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(document_id = id, status = %transient, error = %e, "Operation failed, reverting to draft");
                self.revert(id, transient).await;
                Err(e)
            }
            Err(panic) => {
                tracing::error!(document_id = id, status = %transient, "Operation panicked, reverting to draft");
                self.revert(id, transient).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn revert(&self, id: DocumentId, transient: DocumentStatus) {
        match self.release(id, transient).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(document_id = id, "Document was no longer {} on revert", transient),
            Err(e) => tracing::error!(document_id = id, error = %e, "Failed to revert document to draft"),
        }
    }
}
