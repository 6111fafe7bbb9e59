use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default sampling temperature for `complete`.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
/// Default token limit for `complete`.
pub const DEFAULT_MAX_TOKENS: u32 = 256;
/// System prompt used by `complete` when none is given.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions for the model
    System,
    /// End-user input
    User,
    /// Model output
    Assistant,
}

/// A single message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call tuning for `complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Optional stop sequence
    pub stop: Option<String>,
    /// Overrides the default system prompt
    pub system_message: Option<String>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stop: None,
            system_message: None,
        }
    }
}

impl CompletionParams {
    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the stop sequence.
    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop = Some(stop.into());
        self
    }

    /// Sets the system prompt.
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    /// Returns the system prompt to send.
    pub fn system_message(&self) -> &str {
        self.system_message.as_deref().unwrap_or(DEFAULT_SYSTEM_MESSAGE)
    }
}

/// Request body for `send_message`, sent verbatim to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use
    pub model: String,
    /// The conversation so far
    pub messages: Vec<ChatMessage>,
    /// Whether the provider should stream the answer as SSE events
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    /// Additional provider-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    /// Creates a non-streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: None,
            max_tokens: None,
            stop: None,
            extra: Map::new(),
        }
    }

    /// Selects streaming or single-shot mode.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Adds a provider-specific field to the body.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Body posted by `complete`.
#[derive(Debug, Serialize)]
pub(crate) struct CompletionBody<'a> {
    pub model: &'a str,
    pub messages: [ChatMessage; 2],
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<&'a str>,
}

impl<'a> CompletionBody<'a> {
    pub fn new(model: &'a str, prompt: &str, params: &'a CompletionParams) -> Self {
        Self {
            model,
            messages: [
                ChatMessage::system(params.system_message()),
                ChatMessage::user(prompt),
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stop: params.stop.as_deref(),
        }
    }
}

/// The message produced by a `send_message` call, streamed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedResult {
    /// Author role, "assistant" unless the provider says otherwise
    pub role: String,
    /// Provider id of the response, or a generated fallback
    pub id: String,
    /// All content received so far
    pub text: String,
    /// The most recent content increment
    pub delta: Option<String>,
    /// The last raw response object or stream event
    pub detail: Option<Value>,
    /// Id of the message this one answers
    pub parent_message_id: String,
}

impl AccumulatedResult {
    /// Creates an empty assistant result.
    pub fn new(id: impl Into<String>, parent_message_id: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            id: id.into(),
            text: String::new(),
            delta: None,
            detail: None,
            parent_message_id: parent_message_id.into(),
        }
    }
}

/// Non-streaming chat completion response.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Returns `choices[0].message`, if any.
    pub fn first_message(&self) -> Option<&ResponseMessage> {
        self.choices
            .as_ref()
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.message.as_ref())
    }
}

/// Streaming response chunk.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<ChunkChoice>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_params_defaults() {
        let params = CompletionParams::default();
        assert_eq!(params.temperature, 0.8);
        assert_eq!(params.max_tokens, 256);
        assert_eq!(params.system_message(), DEFAULT_SYSTEM_MESSAGE);

        let partial: CompletionParams = serde_json::from_value(json!({"temperature": 0.5})).unwrap();
        assert_eq!(partial.temperature, 0.5);
        assert_eq!(partial.max_tokens, 256);
        assert_eq!(partial.stop, None);
    }

    #[test]
    fn test_completion_body_shape() {
        let params = CompletionParams::default()
            .with_temperature(0.5)
            .with_system_message("Be brief.");
        let body = serde_json::to_value(CompletionBody::new("gpt-3.5-turbo", "Hello", &params)).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hello"}
                ],
                "temperature": 0.5,
                "max_tokens": 256
            })
        );

        let params = params.with_stop("\n");
        let body = serde_json::to_value(CompletionBody::new("m", "Hi", &params)).unwrap();
        assert_eq!(body["stop"], "\n");
    }

    #[test]
    fn test_chat_request_flattens_extra() {
        let request = ChatRequest::new("gpt-4o", vec![ChatMessage::user("hi")])
            .with_stream(true)
            .with_extra("presence_penalty", json!(0.2));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["stream"], true);
        assert_eq!(body["presence_penalty"], 0.2);
        assert!(body.get("temperature").is_none());
        assert!(body.get("extra").is_none());
    }

    #[test]
    fn test_accumulated_result_is_camel_case() {
        let result = AccumulatedResult::new("id-1", "parent-1");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["role"], "assistant");
        assert_eq!(value["parentMessageId"], "parent-1");
        assert_eq!(value["text"], "");
    }

    #[test]
    fn test_first_message() {
        let response: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "hey"}}]})).unwrap();
        assert_eq!(response.first_message().unwrap().content.as_deref(), Some("hey"));

        let empty: ChatCompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(empty.first_message().is_none());
    }
}
