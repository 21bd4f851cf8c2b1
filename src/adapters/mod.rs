//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the consultation core to external systems:
//! - `ai` - Language model providers (OpenAI-compatible, Ollama, mock)
//! - `memory` - In-memory stores, template repository and keyword retriever
//! - `templates` - YAML template directory loader
//! - `http` - axum REST surface

pub mod ai;
pub mod http;
pub mod memory;
pub mod templates;

pub use http::{app_router, ConsultationAppState};
pub use memory::{
    InMemoryMessageStore, InMemorySessionStore, InMemoryTemplateRepository,
    KeywordContextRetriever,
};
pub use templates::YamlTemplateLoader;
