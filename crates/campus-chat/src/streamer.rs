//! Response streamer: relays generated text to the caller as events.
//!
//! A turn's stream is a run of `Delta` events closed by exactly one
//! terminal `Done` or `Error`. The session id rides on the first event
//! only. A stream that ends without a terminal event was cut short.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{TextStream, Turn};
use crate::error::{ChatError, GenerativeError};
use crate::session::SessionGuard;

const CHANNEL_CAPACITY: usize = 32;

/// What an event carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Delta,
    Done,
    Error { message: String },
}

/// One event of a turn's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Text appended by this event; empty on terminal events.
    pub delta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Delta,
            delta: text.into(),
            session_id: None,
        }
    }

    pub fn done() -> Self {
        Self {
            kind: EventKind::Done,
            delta: String::new(),
            session_id: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error {
                message: message.into(),
            },
            delta: String::new(),
            session_id: None,
        }
    }

    fn with_session(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Event name used on the wire ("delta", "done", "error").
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Delta => "delta",
            EventKind::Done => "done",
            EventKind::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, EventKind::Delta)
    }
}

/// Event stream of one turn.
pub struct TurnStream {
    session_id: Uuid,
    inner: ReceiverStream<StreamEvent>,
}

impl TurnStream {
    /// Session the turn belongs to.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl Stream for TurnStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Details of the exchange being streamed, recorded once it completes.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub user: String,
    pub prompt: String,
}

/// Relay `text` to a new [`TurnStream`].
///
/// The session guard is held until the stream finishes, so the next turn
/// of the same session sees this one in its history. The turn is recorded
/// only when generation completes. A generator that yields nothing for
/// `idle` ends the turn with an error event, and a consumer that drops the
/// stream ends it at once; either way the guard is released.
pub fn spawn_turn_stream(
    mut guard: SessionGuard,
    pending: PendingTurn,
    text: TextStream,
    idle: Duration,
) -> TurnStream {
    let session_id = guard.session_id();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut text = text;
        let mut answer = String::new();
        let mut first = true;
        let mut tag = |event: StreamEvent| {
            if std::mem::take(&mut first) {
                event.with_session(session_id)
            } else {
                event
            }
        };

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    debug!(session_id = %session_id, "Consumer went away; turn not recorded");
                    return;
                }
                next = timeout(idle, text.next()) => next,
            };
            let item = match next {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => {
                    let e = GenerativeError::Timeout(idle);
                    warn!(session_id = %session_id, error = %e, "Generation stalled");
                    let _ = tx.send(tag(StreamEvent::error(e.to_string()))).await;
                    return;
                }
            };
            match item {
                Ok(chunk) if chunk.is_empty() => continue,
                Ok(chunk) => {
                    answer.push_str(&chunk);
                    if tx.send(tag(StreamEvent::delta(chunk))).await.is_err() {
                        debug!(session_id = %session_id, "Consumer went away; turn not recorded");
                        return;
                    }
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Generation failed mid-stream");
                    let _ = tx.send(tag(StreamEvent::error(e.to_string()))).await;
                    return;
                }
            }
        }

        let chars = answer.chars().count();
        guard.append(Turn::new(pending.user, pending.prompt, answer));
        info!(session_id = %session_id, chars, "Turn complete");
        let _ = tx.send(tag(StreamEvent::done())).await;
    });

    TurnStream {
        session_id,
        inner: ReceiverStream::new(rx),
    }
}

/// Drain a turn's events into the full answer.
///
/// Fails with [`ChatError::IncompleteStream`] when the stream ends before
/// a terminal event.
pub async fn collect_response<S>(mut events: S) -> Result<(String, Uuid), ChatError>
where
    S: Stream<Item = StreamEvent> + Unpin,
{
    let mut answer = String::new();
    let mut session_id = None;

    while let Some(event) = events.next().await {
        if session_id.is_none() {
            session_id = event.session_id;
        }
        match event.kind {
            EventKind::Delta => answer.push_str(&event.delta),
            EventKind::Done => {
                return session_id
                    .map(|id| (answer, id))
                    .ok_or(ChatError::IncompleteStream);
            }
            EventKind::Error { message } => {
                return Err(ChatError::Generative(GenerativeError::Stream(message)));
            }
        }
    }
    Err(ChatError::IncompleteStream)
}
