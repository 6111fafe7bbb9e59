//! Folding a stream of chat-completion chunks into one [`AccumulatedResult`].

use futures::stream::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::ProgressHandler;
use super::types::{AccumulatedResult, ChatCompletionChunk};
use crate::error::{ChatError, Result};
use crate::sse::EventStream;

/// Consumes `events` until the stream ends, updating `result` in place.
///
/// Events are handled strictly one at a time: the handler is awaited before
/// the next event is read. Cancelling `signal` while waiting for an event
/// stops the loop with [`ChatError::Cancelled`].
pub async fn accumulate(
    mut events: EventStream,
    mut result: AccumulatedResult,
    on_progress: Option<&dyn ProgressHandler>,
    signal: Option<&CancellationToken>,
) -> Result<AccumulatedResult> {
    let mut id_taken = false;
    let mut chunks = 0usize;

    loop {
        let next = match signal {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ChatError::Cancelled),
                item = events.next() => item,
            },
            None => events.next().await,
        };

        let Some(event) = next else {
            break;
        };

        if apply_event(&mut result, &mut id_taken, event?)? {
            chunks += 1;
            if let Some(handler) = on_progress {
                handler
                    .on_progress(&result)
                    .await
                    .map_err(ChatError::Progress)?;
            }
        }
    }

    debug!(chunks, id = %result.id, "Stream finished");
    Ok(result)
}

/// Applies one event; returns whether it carried a content delta.
fn apply_event(result: &mut AccumulatedResult, id_taken: &mut bool, event: Value) -> Result<bool> {
    let chunk = ChatCompletionChunk::deserialize(&event)
        .map_err(|e| ChatError::MalformedResponse(format!("invalid stream chunk: {}", e)))?;

    if let Some(id) = chunk.id.filter(|id| !id.is_empty()) {
        if !*id_taken {
            result.id = id;
            *id_taken = true;
        }
    }

    let Some(choice) = chunk.choices.and_then(|choices| choices.into_iter().next()) else {
        return Ok(false);
    };

    let delta = choice.delta.unwrap_or_default();
    if let Some(content) = delta.content.as_deref() {
        result.text.push_str(content);
    }
    if let Some(role) = delta.role.filter(|role| !role.is_empty()) {
        result.role = role;
    }
    let has_content = delta.content.is_some();
    result.delta = delta.content;
    result.detail = Some(event);

    Ok(has_content)
}
