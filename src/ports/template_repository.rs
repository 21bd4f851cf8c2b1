//! Template repository port (read-only).

use async_trait::async_trait;

use super::StoreError;
use crate::domain::consultation::{Stage, Template};
use crate::domain::foundation::TemplateId;

/// Read access to consultation templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Find a template by its ID.
    ///
    /// Returns `None` if not found.
    async fn get(&self, id: &TemplateId) -> Result<Option<Template>, StoreError>;

    /// The template's stages in sequence order.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the template does not exist
    async fn stages_of(&self, id: &TemplateId) -> Result<Vec<Stage>, StoreError> {
        self.get(id)
            .await?
            .map(|t| t.stages().to_vec())
            .ok_or_else(|| StoreError::NotFound(format!("template {}", id)))
    }

    /// All known templates.
    async fn list(&self) -> Result<Vec<Template>, StoreError>;
}
