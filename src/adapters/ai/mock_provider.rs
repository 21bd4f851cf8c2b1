//! Mock language model for testing.
//!
//! Provides a scripted implementation of the LanguageModel port so the
//! orchestrator and evaluator can be exercised without a real backend.
//!
//! # Features
//!
//! - Pre-configured responses, consumed in call order
//! - Error injection for resilience testing
//! - Simulated delays for timeout testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let model = MockLanguageModel::new()
//!     .with_response("What uptime do you need?")
//!     .with_response("YES - uptime target captured")
//!     .with_error(MockError::Network { message: "refused".into() });
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, CompletionRequest, CompletionResponse, FinishReason, LanguageModel, ProviderInfo,
    TokenUsage,
};

/// Content returned once the script is exhausted.
pub const DEFAULT_MOCK_RESPONSE: &str = "Mock response";

/// Scripted language model.
#[derive(Debug, Clone)]
pub struct MockLanguageModel {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    default_response: String,
    info: ProviderInfo,
    delay: Duration,
    healthy: bool,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(String),
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Parse { message: String },
    Timeout { timeout_secs: u64 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::Parse { message } => AIError::parse(message),
            MockError::Timeout { timeout_secs } => AIError::timeout(timeout_secs),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: DEFAULT_MOCK_RESPONSE.to_string(),
            info: ProviderInfo::new("mock", "mock-model-1"),
            delay: Duration::ZERO,
            healthy: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a successful response to the queue.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        lock(&self.responses).push_back(MockResponse::Success(content.into()));
        self
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: MockError) -> Self {
        lock(&self.responses).push_back(MockResponse::Error(error));
        self
    }

    /// Sets the content returned once the queue is empty.
    pub fn with_default_response(mut self, content: impl Into<String>) -> Self {
        self.default_response = content.into();
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes `health_check` fail.
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Queues a response on an already shared mock.
    pub fn push_response(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    pub fn last_call(&self) -> Option<CompletionRequest> {
        lock(&self.calls).last().cloned()
    }

    fn next_response(&self) -> MockResponse {
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| MockResponse::Success(self.default_response.clone()))
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response() {
            MockResponse::Success(content) => Ok(CompletionResponse {
                content,
                usage: TokenUsage::new(10, 20),
                model: self.info.model.clone(),
                finish_reason: FinishReason::Stop,
            }),
            MockResponse::Error(err) => Err(err.into()),
        }
    }

    async fn health_check(&self) -> Result<(), AIError> {
        if self.healthy {
            Ok(())
        } else {
            Err(AIError::unavailable("mock marked unhealthy"))
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MessageRole;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new().with_message(MessageRole::User, text)
    }

    #[tokio::test]
    async fn returns_scripted_responses_in_order() {
        let model = MockLanguageModel::new()
            .with_response("first")
            .with_response("second");

        assert_eq!(model.generate(request("a")).await.unwrap().content, "first");
        assert_eq!(model.generate(request("b")).await.unwrap().content, "second");
        assert_eq!(
            model.generate(request("c")).await.unwrap().content,
            DEFAULT_MOCK_RESPONSE
        );
    }

    #[tokio::test]
    async fn injects_errors() {
        let model = MockLanguageModel::new().with_error(MockError::Network {
            message: "connection refused".into(),
        });

        let err = model.generate(request("a")).await.unwrap_err();
        assert!(matches!(err, AIError::Network(_)));
    }

    #[tokio::test]
    async fn records_calls() {
        let model = MockLanguageModel::new();
        model.generate(request("hello")).await.unwrap();

        assert_eq!(model.call_count(), 1);
        assert_eq!(model.last_call().unwrap().messages[0].content, "hello");
    }

    #[tokio::test]
    async fn clones_share_script_and_history() {
        let model = MockLanguageModel::new();
        let shared = model.clone();
        shared.push_response(MockResponse::Success("queued later".into()));

        assert_eq!(model.generate(request("x")).await.unwrap().content, "queued later");
        assert_eq!(shared.call_count(), 1);
    }

    #[tokio::test]
    async fn health_reflects_configuration() {
        assert!(MockLanguageModel::new().health_check().await.is_ok());
        assert!(MockLanguageModel::new().unhealthy().health_check().await.is_err());
    }
}
