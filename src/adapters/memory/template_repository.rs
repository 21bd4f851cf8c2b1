//! In-memory template repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::consultation::Template;
use crate::domain::foundation::TemplateId;
use crate::ports::{StoreError, TemplateRepository};

/// Read-mostly template catalogue, populated at startup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateRepository {
    templates: Arc<RwLock<HashMap<TemplateId, Template>>>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a repository preloaded with `templates`.
    pub fn with_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let map = templates
            .into_iter()
            .map(|t| (t.id().clone(), t))
            .collect();
        Self {
            templates: Arc::new(RwLock::new(map)),
        }
    }

    /// Adds or replaces a template.
    pub async fn insert(&self, template: Template) {
        self.templates
            .write()
            .await
            .insert(template.id().clone(), template);
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn get(&self, id: &TemplateId) -> Result<Option<Template>, StoreError> {
        Ok(self.templates.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Template>, StoreError> {
        let mut all: Vec<_> = self.templates.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(all)
    }
}
