//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the consultation core and the outside world. Adapters implement these ports.
//!
//! - `LanguageModel` - Text generation (OpenAI, Ollama, test doubles)
//! - `ContextRetriever` - Optional grounding documents for generation
//! - `TemplateRepository` - Read-only consultation templates
//! - `SessionStore` - Versioned session persistence
//! - `MessageStore` - Append-only transcripts

mod context_retriever;
mod language_model;
mod message_store;
mod session_store;
mod template_repository;

pub use context_retriever::{
    ContextRetriever, MetadataFilter, RetrievalError, RetrievedContext, SourceRef,
};
pub use language_model::{
    AIError, CompletionRequest, CompletionResponse, FinishReason, LanguageModel, Message,
    MessageRole, ProviderInfo, TokenUsage,
};
pub use message_store::MessageStore;
pub use session_store::{SessionStore, StoreError};
pub use template_repository::TemplateRepository;
