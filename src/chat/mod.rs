pub mod accumulate;
pub mod client;
pub mod openai;
pub mod types;

pub use accumulate::accumulate;
pub use client::{CallOptions, ChatClient, ChatClientBuilder, ProgressFn, ProgressHandler};
pub use openai::OpenAIClient;
pub use types::{
    AccumulatedResult, ChatMessage, ChatRequest, ChatRole, CompletionParams, DEFAULT_MAX_TOKENS,
    DEFAULT_SYSTEM_MESSAGE, DEFAULT_TEMPERATURE,
};
