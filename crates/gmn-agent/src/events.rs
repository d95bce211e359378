//! UI event stream
//!
//! The loop emits typed events over a bounded channel; the presentation
//! layer consumes them from its own task. With no consumer attached,
//! emission is a no-op.

use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use gmn_protocol::{JsonMap, TokenUsage};

/// Visual state of one tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    Success,
    Error,
    Cancelled,
}

/// Events the loop reports while a turn is in flight
#[derive(Debug, Clone)]
pub enum UiEvent {
    UserTurnAdded {
        text: String,
    },
    ModelTextChunk {
        text: String,
    },
    ToolCallStarted {
        name: String,
        summary: String,
    },
    ToolCallFinished {
        name: String,
        status: ToolCallStatus,
        info: String,
    },
    /// Clean end of a turn, with the usage accumulated across its
    /// backend calls
    Done {
        usage: TokenUsage,
    },
    Error {
        message: String,
    },
    Cancelled,
}

pub struct EventStream {
    receiver: mpsc::Receiver<UiEvent>,
}

impl EventStream {
    pub fn channel(buffer: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (EventSender { sender: tx }, Self { receiver: rx })
    }

    pub async fn recv(&mut self) -> Option<UiEvent> {
        self.receiver.recv().await
    }
}

impl Stream for EventStream {
    type Item = UiEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[derive(Clone)]
pub struct EventSender {
    sender: mpsc::Sender<UiEvent>,
}

impl EventSender {
    pub async fn send(&self, event: UiEvent) -> Result<(), mpsc::error::SendError<UiEvent>> {
        self.sender.send(event).await
    }
}

/// One-line argument preview for tool-call notices: the most telling
/// argument, elided at 40 chars
pub fn summarize_args(args: &JsonMap) -> String {
    for key in ["path", "pattern", "url", "command", "query"] {
        if let Some(value) = args.get(key).and_then(Value::as_str) {
            return elide(value, 40);
        }
    }
    String::new()
}

fn elide(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
