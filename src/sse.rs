//! Server-sent events framing.
//!
//! Turns a raw response body into a lazy stream of JSON payloads, one per SSE
//! event. Comment lines and non-`data` fields are ignored, a `[DONE]` payload
//! ends the stream early, and payloads that are not JSON are skipped.

use async_stream::stream;
use bytes::Buf;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::io;
use std::pin::Pin;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::error::{ChatError, Result};

/// Sentinel payload some providers send before closing the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// A lazy, finite stream of parsed SSE payloads.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Parses the body of a streaming HTTP response.
pub fn parse_sse_stream(response: reqwest::Response) -> EventStream {
    decode_events(response.bytes_stream())
}

/// Parses any byte stream carrying `text/event-stream` content.
pub fn decode_events<S, B, E>(body: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: Buf + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let reader = StreamReader::new(body.map_err(io::Error::other));
    let mut lines = Box::pin(FramedRead::new(
        reader,
        LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
    ));

    let s = stream! {
        let mut data: Option<String> = None;

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    yield Err(codec_error(e));
                    return;
                }
            };

            if line.is_empty() {
                match data.take().map(|payload| decode_payload(&payload)) {
                    Some(Payload::Done) => return,
                    Some(Payload::Event(value)) => yield Ok(value),
                    Some(Payload::Skip) | None => {}
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_str(), ""),
            };

            if field == "data" {
                match data.as_mut() {
                    Some(buf) => {
                        buf.push('\n');
                        buf.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                }
            }
        }

        // The server may close without a trailing blank line.
        if let Some(Payload::Event(value)) = data.take().map(|payload| decode_payload(&payload)) {
            yield Ok(value);
        }
    };

    Box::pin(s)
}

enum Payload {
    Event(Value),
    Done,
    Skip,
}

fn decode_payload(payload: &str) -> Payload {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Payload::Done;
    }
    if payload.is_empty() {
        return Payload::Skip;
    }

    match serde_json::from_str(payload) {
        Ok(value) => Payload::Event(value),
        Err(e) => {
            warn!(error = %e, "Skipping non-JSON SSE payload");
            Payload::Skip
        }
    }
}

fn codec_error(e: LinesCodecError) -> ChatError {
    match e {
        LinesCodecError::Io(e) => ChatError::Io(e),
        LinesCodecError::MaxLineLengthExceeded => ChatError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "SSE line exceeds maximum length",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use serde_json::json;

    fn body(chunks: &[&'static str]) -> EventStream {
        let chunks: Vec<io::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        decode_events(stream::iter(chunks))
    }

    async fn collect(events: EventStream) -> Vec<Value> {
        events.map(|e| e.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_events_split_across_chunks() {
        let events = collect(body(&[
            "data: {\"id\":\"a\",",
            "\"n\":1}\n\nda",
            "ta: {\"n\":2}\r\n\r\n",
        ]))
        .await;

        assert_eq!(events, vec![json!({"id": "a", "n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_done_sentinel_ends_stream() {
        let events = collect(body(&[
            "data: {\"n\":1}\n\n",
            "data: [DONE]\n\n",
            "data: {\"n\":2}\n\n",
        ]))
        .await;

        assert_eq!(events, vec![json!({"n": 1})]);
    }

    #[tokio::test]
    async fn test_ignores_comments_fields_and_garbage() {
        let events = collect(body(&[
            ": keep-alive\n\n",
            "event: message\nid: 7\nretry: 100\ndata:{\"n\":1}\n\n",
            "data: not json\n\n",
            "data: {\"n\":\n",
            "data: 2}\n\n",
        ]))
        .await;

        assert_eq!(events, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_flushes_final_event_without_blank_line() {
        let events = collect(body(&["data: {\"n\":1}\n\ndata: {\"n\":2}"])).await;

        assert_eq!(events, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_as_io() {
        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {\"n\":1}\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut events = decode_events(stream::iter(chunks));

        assert_eq!(events.next().await.unwrap().unwrap(), json!({"n": 1}));
        match events.next().await {
            Some(Err(ChatError::Io(e))) => assert_eq!(e.kind(), io::ErrorKind::Other),
            other => panic!("expected IO error, got {:?}", other),
        }
        assert!(events.next().await.is_none());
    }
}
