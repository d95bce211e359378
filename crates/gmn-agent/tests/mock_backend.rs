//! Scripted backend for agent-loop tests
//!
//! Each queued entry answers one `generate_stream` call: either a failure
//! at open, or a pre-scripted sequence of stream events. All requests are
//! recorded for assertions on models, prompt ids, and sent history.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use gmn_backend::{BackendClient, BackendError, EventStream};
use gmn_protocol::{Content, FunctionCall, GenerateRequest, StreamEvent, TokenUsage};

pub struct RecordedRequest {
    pub model: String,
    pub user_prompt_id: String,
    pub contents: Vec<Content>,
}

#[derive(Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Result<Vec<StreamEvent>, BackendError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_events(&self, events: Vec<StreamEvent>) {
        self.script.lock().unwrap().push_back(Ok(events));
    }

    pub fn queue_open_error(&self, error: BackendError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// A plain text answer followed by a terminal done
    pub fn queue_text(&self, text: &str, usage: TokenUsage) {
        self.queue_events(vec![
            StreamEvent::TextChunk(text.to_string()),
            StreamEvent::Done { usage: Some(usage) },
        ]);
    }

    /// A single tool call followed by a terminal done
    pub fn queue_tool_call(&self, call: FunctionCall) {
        self.queue_events(vec![
            StreamEvent::ToolCall(call),
            StreamEvent::Done {
                usage: Some(TokenUsage::new(10, 5)),
            },
        ]);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn generate_stream(&self, req: &GenerateRequest) -> Result<EventStream, BackendError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: req.model.clone(),
            user_prompt_id: req.user_prompt_id.clone(),
            contents: req.contents.clone(),
        });

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Stream("no scripted response left".to_string())));
        next.map(EventStream::from_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmn_protocol::{Content, GenerationConfig};

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "m".to_string(),
            project: "p".to_string(),
            user_prompt_id: "gmn-chat-1-0".to_string(),
            contents: vec![Content::user_text("hi")],
            config: GenerationConfig::default(),
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn scripted_events_replay_in_order() {
        let backend = MockBackend::new();
        backend.queue_text("hello", TokenUsage::new(1, 2));

        let mut stream = backend.generate_stream(&request()).await.unwrap();
        assert!(matches!(stream.recv().await, Some(StreamEvent::TextChunk(t)) if t == "hello"));
        assert!(matches!(stream.recv().await, Some(StreamEvent::Done { .. })));
        assert!(stream.recv().await.is_none());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let backend = MockBackend::new();
        let result = backend.generate_stream(&request()).await;
        assert!(matches!(result, Err(BackendError::Stream(_))));
    }
}
