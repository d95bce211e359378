//! Events emitted by the streaming backend client

use crate::{FunctionCall, TokenUsage};

/// One observation from a single backend call.
///
/// `TextChunk` and `ToolCall` events arrive in the exact order the model
/// emitted them; both may appear within one call. Errors are first-class
/// events so a stream always terminates cleanly.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental model text
    TextChunk(String),
    /// A complete function call, thought signature included
    ToolCall(FunctionCall),
    /// Terminal chunk; usage is present when the backend reported it
    Done { usage: Option<TokenUsage> },
    /// Stream or transport failure; the stream closes after this
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
