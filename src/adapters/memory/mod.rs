//! In-memory adapters.
//!
//! Process-local implementations of the storage and retrieval ports, used
//! by the default composition root and as test doubles.

mod context_retriever;
mod message_store;
mod session_store;
mod template_repository;

pub use context_retriever::{KeywordContextRetriever, ReferenceDocument};
pub use message_store::InMemoryMessageStore;
pub use session_store::InMemorySessionStore;
pub use template_repository::InMemoryTemplateRepository;
