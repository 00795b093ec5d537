//! Stream multiplexer: turns one supervisor invocation into an ordered
//! event stream.
//!
//! Contract per stream: one initial metadata event, zero or more metadata
//! events bridged from workflow progress, content fragments whose
//! concatenation equals the synchronous response text, then exactly one
//! `End`. On failure: at most one `Error`, then `End`. Events never
//! interleave out of this order because a single pump task owns the sender.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::sdk::{ProgressSender, StreamEvent, WorkflowEvent};
use crate::supervisor::Supervisor;

/// Ordered stream of events for one request.
pub struct EventStream {
    rx: UnboundedReceiver<StreamEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: UnboundedReceiver<StreamEvent>) -> Self {
        Self { rx }
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Handle one message through the supervisor and expose the result as an
/// event stream. The pump task runs to completion even if the consumer
/// drops the stream early; send failures after that are ignored.
pub fn stream_message(
    supervisor: Arc<Supervisor>,
    thread_id: impl Into<String>,
    text: impl Into<String>,
) -> EventStream {
    stream_message_parts(supervisor, thread_id, text).0
}

/// Like `stream_message`, but also hands back the pump task's handle so the
/// caller can abort the underlying workflow. An aborted pump closes the
/// channel without having sent `End`.
pub(crate) fn stream_message_parts(
    supervisor: Arc<Supervisor>,
    thread_id: impl Into<String>,
    text: impl Into<String>,
) -> (EventStream, tokio::task::JoinHandle<()>) {
    let thread_id = thread_id.into();
    let text = text.into();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(pump(supervisor, thread_id, text, tx));

    (EventStream::new(rx), handle)
}

async fn pump(
    supervisor: Arc<Supervisor>,
    thread_id: String,
    text: String,
    tx: UnboundedSender<StreamEvent>,
) {
    let _ = tx.send(StreamEvent::metadata(json!({
        "thread_id": thread_id,
        "status": "started",
    })));

    // Bridge workflow progress into metadata events while the supervisor
    // runs. The forwarder ends when the workflow drops its sender.
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let bridge_tx = tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            let data = match serde_json::to_value(&event) {
                Ok(data) => data,
                Err(_) => continue,
            };
            if bridge_tx.send(StreamEvent::metadata(data)).is_err() {
                break;
            }
        }
    });

    let progress = ProgressSender::new(progress_tx);
    let result = supervisor
        .handle_with_progress(&thread_id, &text, &progress)
        .await;
    drop(progress);
    let _ = forwarder.await;

    match result {
        Ok(output) => {
            let chunk_size = supervisor.config().content_chunk_chars;
            let chunks = chunk_text(&output.text, chunk_size);
            let total = chunks.len();
            debug!(thread_id = %thread_id, chunks = total, "streaming response content");
            for (i, chunk) in chunks.into_iter().enumerate() {
                let _ = tx.send(StreamEvent::content(chunk, i + 1 < total));
            }
        }
        Err(err) => {
            let _ = tx.send(StreamEvent::error(err.user_message()));
        }
    }

    let _ = tx.send(StreamEvent::end());
}

/// Split text into chunks of at most `size` characters, never splitting a
/// character. Empty text yields no chunks.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for c in text.chars() {
        current.push(c);
        count += 1;
        if count == size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::model::TemplateModel;
    use crate::sdk::StreamPayload;
    use crate::store::InMemoryThreadStore;
    use futures::StreamExt;

    fn supervisor() -> Arc<Supervisor> {
        Arc::new(Supervisor::new(
            Arc::new(InMemoryThreadStore::new()),
            Arc::new(TemplateModel::new()),
            OrchestratorConfig::default(),
        ))
    }

    async fn collect(mut stream: EventStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_chunk_text_respects_char_boundaries() {
        let chunks = chunk_text("héllo wörld", 3);
        assert_eq!(chunks.concat(), "héllo wörld");
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }

    #[test]
    fn test_chunk_text_empty_yields_nothing() {
        assert!(chunk_text("", 100).is_empty());
    }

    #[tokio::test]
    async fn test_stream_starts_with_metadata_and_ends_once() {
        let events = collect(stream_message(supervisor(), "t1", "hello there")).await;

        assert!(matches!(events[0].payload, StreamPayload::Metadata(_)));
        let ends = events.iter().filter(|e| e.is_end()).count();
        assert_eq!(ends, 1);
        assert!(events.last().unwrap().is_end());
    }

    #[tokio::test]
    async fn test_content_concatenation_matches_sync_output() {
        let sup = supervisor();
        let sync_output = sup.handle("sync", "tell me about rust").await.unwrap();

        let events = collect(stream_message(sup, "streamed", "tell me about rust")).await;
        let streamed: String = events
            .iter()
            .filter_map(|e| match &e.payload {
                StreamPayload::Content { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(streamed, sync_output.text);
    }

    #[tokio::test]
    async fn test_last_content_fragment_is_final() {
        let events = collect(stream_message(supervisor(), "t1", "report about honey bees")).await;
        let partial_flags: Vec<bool> = events
            .iter()
            .filter_map(|e| match &e.payload {
                StreamPayload::Content { is_partial, .. } => Some(*is_partial),
                _ => None,
            })
            .collect();
        assert!(partial_flags.len() > 1);
        assert!(!partial_flags.last().unwrap());
        assert!(partial_flags[..partial_flags.len() - 1].iter().all(|p| *p));
    }

    #[tokio::test]
    async fn test_workflow_progress_bridged_as_metadata() {
        let events = collect(stream_message(supervisor(), "t1", "report about honey bees")).await;
        let phase_events = events
            .iter()
            .filter(|e| match &e.payload {
                StreamPayload::Metadata(data) => data["type"] == json!("phase_completed"),
                _ => false,
            })
            .count();
        assert_eq!(phase_events, 4);
    }

    #[tokio::test]
    async fn test_concurrent_request_on_same_thread_still_terminates() {
        let sup = supervisor();
        // Hold the thread by streaming a slow report, then race a second
        // request on the same thread. The second sees ThreadBusy.
        let sync_sup = sup.clone();
        let first = tokio::spawn(async move {
            collect(stream_message(sync_sup, "t1", "report about honey bees")).await
        });
        tokio::task::yield_now().await;

        let second = sup.handle("t1", "hello").await;
        let first_events = first.await.unwrap();
        assert!(first_events.last().unwrap().is_end());

        if let Err(err) = second {
            assert!(matches!(
                err,
                crate::sdk::OrchestratorError::ThreadBusy { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_stream_serialization_shape() {
        let event = StreamEvent::content("hi", true);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("content"));
        assert_eq!(value["data"]["text"], json!("hi"));
        assert!(value["timestamp"].is_string());
    }
}
