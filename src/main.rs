//! `streaming-chat` command line client.
//!
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! streaming-chat complete "Hello"
//! streaming-chat chat "Tell me a story"
//! streaming-chat --service mlc chat "Hi" --no-stream
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use streaming_chat::{
    AccumulatedResult, CallOptions, ChatClient, ChatClientBuilder, ChatError, ChatMessage,
    ChatRequest, CompletionParams, ProgressFn, ServiceRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "streaming-chat", version, about = "Talk to an OpenAI-compatible chat API")]
struct Cli {
    /// Service profile to use
    #[arg(long, default_value = "openai")]
    service: String,

    /// API key (defaults to OPENAI_API_KEY)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// JSON file with an array of service profiles
    #[arg(long)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Single-shot completion
    Complete {
        prompt: String,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// System prompt
        #[arg(long)]
        system: Option<String>,
    },
    /// Send a chat message, streaming the answer
    Chat {
        prompt: String,
        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// Check whether the API key is accepted
    CheckKey {
        /// Key to check instead of the configured one
        #[arg(long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = ChatClientBuilder::new().with_service(&cli.service);
    if let Some(key) = cli.api_key {
        builder = builder.with_api_key(key);
    }
    if let Some(path) = &cli.registry {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading registry {}", path.display()))?;
        builder = builder.with_registry(ServiceRegistry::from_json(&json)?);
    }
    let client = builder.build()?;

    match cli.command {
        Command::Complete {
            prompt,
            temperature,
            max_tokens,
            system,
        } => {
            let mut params = CompletionParams::default();
            if let Some(temperature) = temperature {
                params = params.with_temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                params = params.with_max_tokens(max_tokens);
            }
            if let Some(system) = system {
                params = params.with_system_message(system);
            }

            match client.complete(&prompt, Some(params)).await? {
                Some(text) => println!("{}", text),
                None => eprintln!("(no content in response)"),
            }
        }
        Command::Chat { prompt, no_stream } => {
            let request = ChatRequest::new(
                client.profile().model.clone(),
                vec![ChatMessage::user(prompt)],
            )
            .with_stream(!no_stream);

            let signal = CancellationToken::new();
            let ctrl_c = signal.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let progress = ProgressFn(|partial: AccumulatedResult| async move {
                if let Some(delta) = partial.delta {
                    print!("{}", delta);
                    std::io::stdout().flush()?;
                }
                Ok::<_, anyhow::Error>(())
            });
            let options = CallOptions::new()
                .with_progress(Arc::new(progress))
                .with_signal(signal);

            match client.send_message(request, options).await {
                Ok(result) if no_stream => println!("{}", result.text),
                Ok(_) => println!(),
                Err(ChatError::Cancelled) => eprintln!("\n(cancelled)"),
                Err(e) => return Err(e.into()),
            }
        }
        Command::CheckKey { key } => {
            client.check_api_key(key.as_deref()).await?;
            println!("API key is valid for '{}'", client.profile().name);
        }
    }

    Ok(())
}
