use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::accumulate::accumulate;
use super::client::{CallOptions, ChatClient};
use super::types::{
    AccumulatedResult, ChatCompletionResponse, ChatRequest, CompletionBody, CompletionParams,
};
use crate::error::{ChatError, Result};
use crate::id::IdGenerator;
use crate::service::ServiceProfile;
use crate::sse::parse_sse_stream;

/// A chat client for OpenAI-compatible APIs.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    profile: ServiceProfile,
    api_key: String,
    ids: Arc<dyn IdGenerator>,
}

impl fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    /// Creates a new client bound to one service profile.
    pub fn new(
        profile: ServiceProfile,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self> {
        let mut client_builder = Client::builder();
        if let Some(timeout) = timeout {
            client_builder = client_builder.timeout(timeout);
        }

        Ok(Self {
            client: client_builder.build()?,
            profile,
            api_key: api_key.into(),
            ids,
        })
    }

    /// The service profile this client talks to.
    pub fn profile(&self) -> &ServiceProfile {
        &self.profile
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Adds the bearer token, if one is configured.
    fn authorized(&self, request: RequestBuilder, key: &str) -> RequestBuilder {
        if key.is_empty() {
            request
        } else {
            request.bearer_auth(key)
        }
    }

    /// Builds the result of a single-shot `send_message` from the decoded body.
    fn single_result(body: Value, mut result: AccumulatedResult) -> Result<AccumulatedResult> {
        let response = ChatCompletionResponse::deserialize(&body)?;
        let message = response.first_message().ok_or_else(|| {
            ChatError::MalformedResponse("response has no choices[0].message".to_string())
        })?;

        result.text = message.content.clone().unwrap_or_default();
        if let Some(role) = message.role.as_deref().filter(|role| !role.is_empty()) {
            result.role = role.to_string();
        }
        if let Some(id) = response.id.as_deref().filter(|id| !id.is_empty()) {
            result.id = id.to_string();
        }
        result.detail = Some(body);

        Ok(result)
    }
}

/// Awaits `fut` unless `signal` is cancelled first.
async fn with_signal<F: Future>(signal: Option<&CancellationToken>, fut: F) -> Result<F::Output> {
    match signal {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(ChatError::Cancelled),
            output = fut => Ok(output),
        },
        None => Ok(fut.await),
    }
}

/// Turns a failed `send_message` response into a [`ChatError::Provider`].
async fn provider_error(response: reqwest::Response) -> ChatError {
    let status = response.status().as_u16();
    let cause = match response.bytes().await {
        Ok(body) => decode_error_body(&body),
        Err(e) => {
            debug!(status, error = %e, "Failed to read error body");
            Value::Null
        }
    };
    ChatError::provider(status, cause)
}

/// Decodes an error body as UTF-8 JSON, falling back to the raw text.
fn decode_error_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }

    std::str::from_utf8(body)
        .ok()
        .and_then(|text| serde_json::from_str(text).ok())
        .unwrap_or_else(|| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn complete(
        &self,
        prompt: &str,
        params: Option<CompletionParams>,
    ) -> Result<Option<String>> {
        if prompt.is_empty() {
            return Err(ChatError::InvalidRequest("prompt must not be empty".to_string()));
        }

        let params = params.unwrap_or_default();
        let body = CompletionBody::new(&self.profile.model, prompt, &params);
        let url = self.profile.chat_completions_url();

        debug!(model = %self.profile.model, %url, "Sending completion request");

        let bytes = self
            .authorized(self.client.post(&url), &self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let response: ChatCompletionResponse = serde_json::from_slice(&bytes)?;
        Ok(response.first_message().and_then(|message| message.content.clone()))
    }

    async fn send_message(
        &self,
        request: ChatRequest,
        options: CallOptions,
    ) -> Result<AccumulatedResult> {
        let parent_message_id = options
            .parent_message_id
            .unwrap_or_else(|| self.ids.generate());
        let result = AccumulatedResult::new(self.ids.generate(), parent_message_id);
        let signal = options.signal.as_ref();

        debug!(
            model = %request.model,
            endpoint = %self.profile.completion_endpoint,
            stream = request.stream,
            "Sending chat request"
        );

        let mut builder = self
            .authorized(self.client.post(&self.profile.completion_endpoint), &self.api_key)
            .json(&request);
        if request.stream {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }

        let response = with_signal(signal, builder.send()).await??;

        if !response.status().is_success() {
            return Err(with_signal(signal, provider_error(response)).await?);
        }

        if request.stream {
            let events = parse_sse_stream(response);
            return accumulate(events, result, options.on_progress.as_deref(), signal).await;
        }

        let bytes = with_signal(signal, response.bytes()).await??;
        let body: Value = serde_json::from_slice(&bytes)?;
        Self::single_result(body, result)
    }

    async fn check_api_key(&self, candidate: Option<&str>) -> Result<bool> {
        let Some(endpoint) = self.profile.key_validation_endpoint.as_deref() else {
            return Ok(true);
        };

        let key = candidate.unwrap_or(&self.api_key);
        let response = self
            .authorized(self.client.get(endpoint), key)
            .send()
            .await?;

        debug!(status = %response.status(), "API key check");

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ChatError::InvalidApiKey);
        }
        Ok(true)
    }
}
