//! Language Model Adapters.
//!
//! Implementations of the `LanguageModel` port.
//!
//! ## Available Adapters
//!
//! - `MockLanguageModel` - Scripted mock for testing
//! - `OpenAIProvider` - OpenAI chat completions (or any compatible endpoint)
//! - `OllamaProvider` - Local models served by Ollama
//!
//! The backend is chosen once at startup by [`from_config`].

mod mock_provider;
mod ollama_provider;
mod openai_provider;
mod transport;

pub use mock_provider::{MockError, MockLanguageModel, MockResponse, DEFAULT_MOCK_RESPONSE};
pub use ollama_provider::{OllamaConfig, OllamaProvider};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};

use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::config::{AiConfig, AiProvider};
use crate::ports::{AIError, LanguageModel};

/// Builds the configured language model.
///
/// # Errors
///
/// - `AuthenticationFailed` if OpenAI is selected without a key
/// - `InvalidRequest` if the HTTP client cannot be built
pub fn from_config(config: &AiConfig) -> Result<Arc<dyn LanguageModel>, AIError> {
    match config.provider {
        AiProvider::OpenAI => {
            let key = config
                .openai_api_key
                .as_ref()
                .ok_or(AIError::AuthenticationFailed)?;
            let provider = OpenAIProvider::new(
                OpenAIConfig::new(key.expose_secret().clone())
                    .with_model(&config.openai_model)
                    .with_base_url(&config.openai_base_url)
                    .with_timeout(config.timeout())
                    .with_health_timeout(config.health_timeout()),
            )?;
            Ok(Arc::new(provider))
        }
        AiProvider::Ollama => {
            let provider = OllamaProvider::new(
                OllamaConfig::new(&config.ollama_url)
                    .with_model(&config.ollama_model)
                    .with_timeout(config.timeout())
                    .with_health_timeout(config.health_timeout()),
            )?;
            Ok(Arc::new(provider))
        }
    }
}
