//! # Streaming Chat
//!
//! A small, typed client for OpenAI-compatible chat-completion APIs.
//!
//! ## Features
//!
//! - **Completions**: One-shot `complete` with a system + user prompt
//! - **Streaming**: `send_message` folds SSE chunks into a growing result and
//!   reports each step to a progress handler
//! - **Cancellation**: In-flight requests stop on a `CancellationToken`
//! - **Service Registry**: Named backend profiles (OpenAI, local MLC, or your own)
//! - **Key Check**: Validates API keys against the provider
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streaming_chat::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClientBuilder::new()
//!         .with_service("openai")
//!         .with_api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build()?;
//!
//!     let answer = client
//!         .complete("Hello", Some(CompletionParams::default().with_temperature(0.5)))
//!         .await?;
//!     println!("{:?}", answer);
//!
//!     let request = ChatRequest::new(
//!         client.profile().model.clone(),
//!         vec![ChatMessage::user("Tell me a joke")],
//!     )
//!     .with_stream(true);
//!     let progress = ProgressFn(|partial: AccumulatedResult| async move {
//!         println!("{}", partial.text);
//!         Ok::<_, anyhow::Error>(())
//!     });
//!     let result = client
//!         .send_message(request, CallOptions::new().with_progress(Arc::new(progress)))
//!         .await?;
//!     println!("{}", result.text);
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod error;
pub mod id;
pub mod service;
pub mod sse;

// Re-exports for convenient usage
pub use chat::{
    AccumulatedResult, CallOptions, ChatClient, ChatClientBuilder, ChatMessage, ChatRequest,
    ChatRole, CompletionParams, OpenAIClient, ProgressFn, ProgressHandler,
};
pub use error::{ChatError, Result};
pub use id::{IdGenerator, UuidGenerator};
pub use service::{ServiceProfile, ServiceRegistry};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::chat::{
        AccumulatedResult, CallOptions, ChatClient, ChatClientBuilder, ChatMessage, ChatRequest,
        CompletionParams, ProgressFn, ProgressHandler,
    };
    pub use crate::error::ChatError;
    pub use crate::service::{ServiceProfile, ServiceRegistry};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
