use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::openai::OpenAIClient;
use super::types::{AccumulatedResult, ChatRequest, CompletionParams};
use crate::error::{ChatError, Result};
use crate::id::{IdGenerator, UuidGenerator};
use crate::service::ServiceRegistry;

/// Receives the partial result after each streamed chunk.
///
/// The stream is not read any further until `on_progress` returns, and an
/// error aborts the call with [`ChatError::Progress`].
#[async_trait]
pub trait ProgressHandler: Send + Sync {
    async fn on_progress(&self, result: &AccumulatedResult) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`ProgressHandler`].
///
/// The closure receives a snapshot of the result.
pub struct ProgressFn<F>(pub F);

#[async_trait]
impl<F, Fut> ProgressHandler for ProgressFn<F>
where
    F: Fn(AccumulatedResult) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn on_progress(&self, result: &AccumulatedResult) -> anyhow::Result<()> {
        (self.0)(result.clone()).await
    }
}

/// Call-scoped controls for `send_message`, kept apart from the wire body.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Invoked after each streamed chunk that carries content
    pub on_progress: Option<Arc<dyn ProgressHandler>>,
    /// Aborts the in-flight request when cancelled
    pub signal: Option<CancellationToken>,
    /// Id of the message being answered; generated when absent
    pub parent_message_id: Option<String>,
}

impl CallOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the progress handler.
    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.on_progress = Some(handler);
        self
    }

    /// Sets the cancellation token.
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Sets the parent message id.
    pub fn with_parent_message_id(mut self, id: impl Into<String>) -> Self {
        self.parent_message_id = Some(id.into());
        self
    }
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("signal", &self.signal)
            .field("parent_message_id", &self.parent_message_id)
            .finish()
    }
}

/// Trait for chat-completion clients.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends a system + user prompt and returns `choices[0].message.content`.
    async fn complete(
        &self,
        prompt: &str,
        params: Option<CompletionParams>,
    ) -> Result<Option<String>>;

    /// Sends a request, accumulating streamed chunks when `request.stream` is set.
    async fn send_message(
        &self,
        request: ChatRequest,
        options: CallOptions,
    ) -> Result<AccumulatedResult>;

    /// Checks an API key, or the configured one when `candidate` is `None`.
    ///
    /// Returns `Ok(true)` for a usable key and fails with
    /// [`ChatError::InvalidApiKey`] when the provider rejects it.
    async fn check_api_key(&self, candidate: Option<&str>) -> Result<bool>;
}

/// A builder for creating chat clients.
pub struct ChatClientBuilder {
    api_key: Option<String>,
    service: String,
    registry: Option<ServiceRegistry>,
    timeout: Option<Duration>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl Default for ChatClientBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            service: "openai".to_string(),
            registry: None,
            timeout: None,
            ids: None,
        }
    }
}

impl fmt::Debug for ChatClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClientBuilder")
            .field("service", &self.service)
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ChatClientBuilder {
    /// Creates a new builder targeting the "openai" service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Selects the service profile by name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Sets the registry the service is looked up in.
    pub fn with_registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the source of fallback message ids.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Creates an OpenAI-compatible client for the selected service.
    pub fn build(self) -> Result<OpenAIClient> {
        let registry = self.registry.unwrap_or_else(ServiceRegistry::builtin);
        let profile = registry.get(&self.service)?.clone();

        let api_key = self
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        let api_key = match api_key {
            Some(key) => key,
            None if profile.requires_key_validation() => {
                return Err(ChatError::Config(format!(
                    "API key not provided for service '{}'",
                    profile.name
                )));
            }
            None => String::new(),
        };

        OpenAIClient::new(
            profile,
            api_key,
            self.timeout,
            self.ids.unwrap_or_else(|| Arc::new(UuidGenerator)),
        )
    }

    /// Creates the client behind a trait object.
    pub fn build_dyn(self) -> Result<Arc<dyn ChatClient>> {
        Ok(Arc::new(self.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service_is_rejected() {
        let err = ChatClientBuilder::new()
            .with_api_key("sk-test")
            .with_service("nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, ChatError::UnknownService(name) if name == "nope"));
    }

    #[test]
    fn test_local_service_needs_no_key() {
        let client = ChatClientBuilder::new().with_service("mlc").build().unwrap();
        assert_eq!(client.profile().name, "mlc");
    }

    #[test]
    fn test_explicit_key_wins() {
        let client = ChatClientBuilder::new()
            .with_api_key("sk-explicit")
            .build()
            .unwrap();
        assert_eq!(client.profile().name, "openai");
        assert_eq!(client.api_key(), "sk-explicit");
    }
}
