//! Context Retriever Port - grounding text for generation.
//!
//! Optional dependency: without a retriever the orchestrator runs with no
//! augmentation. Failures are never fatal to a turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Port for retrieval-augmented generation.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns up to `top_k` relevant snippets for `query`, joined into one
    /// context block, with provenance for each source used.
    ///
    /// `filter` restricts candidates to documents whose metadata carries
    /// every given key with the given value.
    async fn relevant_context(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievedContext, RetrievalError>;
}

/// Exact-match metadata constraints.
pub type MetadataFilter = BTreeMap<String, String>;

/// Provenance of one retrieved snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub doc_id: String,
    pub title: String,
    pub score: f32,
}

/// Retrieved grounding text; `sources` is empty when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

impl RetrievedContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Retrieval failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("retrieval timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("invalid retrieval query: {0}")]
    InvalidQuery(String),
}
