//! The outbound message sink: the single chokepoint every orchestration
//! stage sends results, summaries, and status updates through.
//!
//! Mirrors `baseHandler.py::send_message`'s streaming/non-streaming split.
//! The non-streaming accumulation shape — `result_batch` messages append,
//! every other message type overwrites — is a pinned, testable invariant.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::Error;
use crate::state::SettableEvent;

/// A single outbound message: a `message_type` discriminant plus arbitrary
/// typed fields, matching the reference implementation's plain dicts.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// The message's type discriminant (`"result_batch"`, `"nlws"`,
    /// `"summary"`, `"asking_sites"`, `"decontextualized_query"`, …).
    pub message_type: String,
    /// Every other field on the message.
    pub fields: Map<String, Value>,
}

impl OutboundMessage {
    /// Starts a new message of the given type with no fields yet.
    #[must_use]
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            fields: Map::new(),
        }
    }

    /// Adds a field, builder-style.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("message_type".to_string(), Value::String(self.message_type.clone()));
        Value::Object(object)
    }
}

/// Sink for the streaming transport this crate doesn't itself implement —
/// an external HTTP/SSE or MCP layer supplies one of these.
#[async_trait]
pub trait StreamWriter: Send + Sync {
    /// Writes one already-serialized message line.
    async fn write(&self, text: &str) -> Result<(), Error>;
}

/// Accumulated state for non-streaming responses: the final JSON object
/// returned once the whole query completes.
#[derive(Debug, Clone, Default)]
pub struct ResponseAccumulator {
    /// Non-`result_batch` fields, keyed by message type. Each later message
    /// of the same type overwrites the previous one entirely.
    pub fields: HashMap<String, Map<String, Value>>,
    /// All `results` entries appended across every `result_batch` message.
    pub results: Vec<Value>,
}

enum SinkMode {
    Streaming(Arc<dyn StreamWriter>),
    NonStreaming(StdMutex<ResponseAccumulator>),
}

/// The per-query outbound message sink.
pub struct StreamSink {
    send_lock: AsyncMutex<()>,
    version_announced: StdMutex<bool>,
    mode: SinkMode,
}

impl StreamSink {
    /// A streaming sink writing through `writer`.
    #[must_use]
    pub fn streaming(writer: Arc<dyn StreamWriter>) -> Self {
        Self {
            send_lock: AsyncMutex::new(()),
            version_announced: StdMutex::new(false),
            mode: SinkMode::Streaming(writer),
        }
    }

    /// A non-streaming sink that accumulates into a final response object.
    #[must_use]
    pub fn non_streaming() -> Self {
        Self {
            send_lock: AsyncMutex::new(()),
            version_announced: StdMutex::new(false),
            mode: SinkMode::NonStreaming(StdMutex::new(ResponseAccumulator::default())),
        }
    }

    /// Sends one message, subject to `connection_alive`.
    ///
    /// The first call on a streaming sink would, per the reference
    /// implementation, construct an `api_version` announcement and mark it
    /// sent — but the actual write of that message is dead code upstream
    /// (`# await self.http_handler.write_stream(version_number_message)`),
    /// so this port suppresses the write too while still flipping the flag,
    /// for parity with anything that inspects it later.
    pub async fn send(
        &self,
        connection_alive: &SettableEvent,
        query_id: &str,
        message: OutboundMessage,
    ) {
        let _guard = self.send_lock.lock().await;
        if !connection_alive.is_set() {
            return;
        }

        match &self.mode {
            SinkMode::Streaming(writer) => {
                {
                    let mut announced = self
                        .version_announced
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    if !*announced {
                        *announced = true;
                        // api_version message intentionally not written — see doc comment.
                    }
                }
                let mut stamped = message;
                stamped.fields.insert("query_id".to_string(), Value::String(query_id.to_string()));
                let text = stamped.to_json().to_string();
                if writer.write(&text).await.is_err() {
                    connection_alive.clear();
                }
            }
            SinkMode::NonStreaming(accumulator) => {
                let mut acc = accumulator
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if message.message_type == "result_batch" {
                    if let Some(Value::Array(results)) = message.fields.get("results") {
                        acc.results.extend(results.iter().cloned());
                    }
                } else {
                    acc.fields.insert(message.message_type.clone(), message.fields);
                }
            }
        }
    }

    /// Sends the terminal `{"message_type":"complete"}` frame closing out a
    /// query's lifecycle. Every orchestrator calls this exactly once, as its
    /// last action, regardless of how the query terminated (normal
    /// completion or an early precheck abort).
    pub async fn send_complete(&self, connection_alive: &SettableEvent, query_id: &str) {
        self.send(connection_alive, query_id, OutboundMessage::new("complete")).await;
    }

    /// A snapshot of the accumulated non-streaming response. Returns `None`
    /// for a streaming sink, which has no such accumulator.
    #[must_use]
    pub fn accumulated(&self) -> Option<ResponseAccumulator> {
        match &self.mode {
            SinkMode::Streaming(_) => None,
            SinkMode::NonStreaming(accumulator) => Some(
                accumulator
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clone(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex as AsyncStdMutex;

    struct RecordingWriter {
        lines: AsyncStdMutex<Vec<String>>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self {
                lines: AsyncStdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StreamWriter for RecordingWriter {
        async fn write(&self, text: &str) -> Result<(), Error> {
            self.lines.lock().await.push(text.to_string());
            Ok(())
        }
    }

    struct FailingWriter;
    #[async_trait]
    impl StreamWriter for FailingWriter {
        async fn write(&self, _text: &str) -> Result<(), Error> {
            Err(Error::ConnectionLost)
        }
    }

    #[tokio::test]
    async fn non_streaming_result_batches_append() {
        let sink = StreamSink::non_streaming();
        let connection_alive = SettableEvent::new(true);
        let batch1 = OutboundMessage::new("result_batch")
            .with_field("results", Value::Array(vec![Value::String("a".to_string())]));
        let batch2 = OutboundMessage::new("result_batch")
            .with_field("results", Value::Array(vec![Value::String("b".to_string())]));
        sink.send(&connection_alive, "q1", batch1).await;
        sink.send(&connection_alive, "q1", batch2).await;
        let accumulated = sink.accumulated().unwrap_or_else(|| unreachable!());
        assert_eq!(accumulated.results.len(), 2);
    }

    #[tokio::test]
    async fn non_streaming_other_types_overwrite() {
        let sink = StreamSink::non_streaming();
        let connection_alive = SettableEvent::new(true);
        sink.send(
            &connection_alive,
            "q1",
            OutboundMessage::new("summary").with_field("text", "first"),
        )
        .await;
        sink.send(
            &connection_alive,
            "q1",
            OutboundMessage::new("summary").with_field("text", "second"),
        )
        .await;
        let accumulated = sink.accumulated().unwrap_or_else(|| unreachable!());
        let summary = accumulated.fields.get("summary").unwrap_or_else(|| unreachable!());
        assert_eq!(summary.get("text"), Some(&Value::String("second".to_string())));
    }

    #[tokio::test]
    async fn send_is_noop_when_connection_dead() {
        let sink = StreamSink::non_streaming();
        let connection_alive = SettableEvent::new(false);
        sink.send(&connection_alive, "q1", OutboundMessage::new("summary")).await;
        let accumulated = sink.accumulated().unwrap_or_else(|| unreachable!());
        assert!(accumulated.fields.is_empty());
    }

    #[tokio::test]
    async fn streaming_first_message_does_not_announce_api_version() {
        let writer = Arc::new(RecordingWriter::new());
        let sink = StreamSink::streaming(writer.clone());
        let connection_alive = SettableEvent::new(true);
        sink.send(&connection_alive, "q1", OutboundMessage::new("nlws")).await;
        let lines = writer.lines.lock().await;
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].contains("api_version"));
    }

    #[tokio::test]
    async fn send_complete_produces_complete_message_type() {
        let sink = StreamSink::non_streaming();
        let connection_alive = SettableEvent::new(true);
        sink.send_complete(&connection_alive, "q1").await;
        let accumulated = sink.accumulated().unwrap_or_else(|| unreachable!());
        assert!(accumulated.fields.contains_key("complete"));
    }

    #[tokio::test]
    async fn streaming_write_failure_clears_connection_alive() {
        let sink = StreamSink::streaming(Arc::new(FailingWriter));
        let connection_alive = SettableEvent::new(true);
        sink.send(&connection_alive, "q1", OutboundMessage::new("nlws")).await;
        assert!(!connection_alive.is_set());
    }
}
