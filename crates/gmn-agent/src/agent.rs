//! The agent loop
//!
//! `submit` drives one user message to completion: stream from the backend
//! (under the fallback policy), surface text, collect tool calls, gate and
//! execute them, feed responses back, and repeat until the model answers
//! with plain text. History is rolled back atomically on any failed turn.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gmn_backend::{BackendClient, BackendError, FallbackPolicy};
use gmn_protocol::{
    Content, FunctionCall, FunctionResponse, GenerateRequest, GenerationConfig, JsonMap,
    StreamEvent, TokenUsage,
};
use gmn_tools::{ConfirmationCategory, Tool, ToolRegistry};

use crate::confirm::{ConfirmationGate, ConfirmationRequest, Outcome};
use crate::events::{summarize_args, EventSender, EventStream, ToolCallStatus, UiEvent};
use crate::{AgentControl, AgentError, Session, SessionStore};

/// Receive tick while draining a stream; bounds cancellation latency
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard bound on backend calls per `submit`
    pub max_iterations: usize,
    /// Per-request deadline; the outer session is unbounded
    pub request_timeout: Duration,
    /// Backend project identifier attached to every request
    pub project: String,
    pub generation: GenerationConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            request_timeout: Duration::from_secs(300),
            project: String::new(),
            generation: GenerationConfig::default(),
        }
    }
}

pub struct AgentLoop {
    config: AgentConfig,
    backend: Arc<dyn BackendClient>,
    fallback: FallbackPolicy,
    registry: ToolRegistry,
    gate: ConfirmationGate,
    control: AgentControl,
    events: Option<EventSender>,
    store: Option<SessionStore>,
    session: Session,
    history: Vec<Content>,
    model: String,
    tokens: TokenUsage,
}

impl AgentLoop {
    pub fn new(
        model: impl Into<String>,
        backend: Arc<dyn BackendClient>,
        registry: ToolRegistry,
        gate: ConfirmationGate,
        config: AgentConfig,
    ) -> Self {
        let model = model.into();
        Self {
            config,
            backend,
            fallback: FallbackPolicy::default(),
            registry,
            gate,
            control: AgentControl::new(),
            events: None,
            store: None,
            session: Session::new(&model),
            history: Vec::new(),
            model,
            tokens: TokenUsage::default(),
        }
    }

    pub fn with_event_stream(mut self) -> (Self, EventStream) {
        let (sender, stream) = EventStream::channel(100);
        self.events = Some(sender);
        (self, stream)
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn control(&self) -> AgentControl {
        self.control.clone()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn tokens(&self) -> TokenUsage {
        self.tokens
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn session_name(&self) -> Option<&str> {
        self.session.name.as_deref()
    }

    pub fn set_session_name(&mut self, name: impl Into<String>) {
        self.session.name = Some(name.into());
    }

    pub fn gate_mut(&mut self) -> &mut ConfirmationGate {
        &mut self.gate
    }

    /// Truncate history but keep the session identity (`/clear`)
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Replace all conversation state with a fresh session (`/new`)
    pub fn start_new_session(&mut self) {
        self.session = Session::new(&self.model);
        self.history.clear();
        self.tokens = TokenUsage::default();
    }

    /// Adopt a previously saved session (`--resume`, `/load`)
    pub fn load_session(&mut self, session: Session) {
        self.model = session.model.clone();
        self.tokens = session.tokens;
        self.history = session.messages.clone();
        self.session = session;
    }

    /// Snapshot conversation state into the store
    pub fn save_session(&mut self) -> Result<(), AgentError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        self.session.model = self.model.clone();
        self.session.tokens = self.tokens;
        self.session.messages = self.history.clone();
        store.save(&mut self.session)?;
        Ok(())
    }

    pub fn list_sessions(&self) -> Result<Vec<Session>, AgentError> {
        let store = self.store.as_ref().ok_or_else(no_store)?;
        Ok(store.list()?)
    }

    pub fn load_session_by_key(&mut self, key: &str) -> Result<(), AgentError> {
        let store = self.store.as_ref().ok_or_else(no_store)?;
        let session = if key == "last" {
            store.load_latest()?
        } else {
            store.load(key)?
        };
        self.load_session(session);
        Ok(())
    }

    /// Drive one user message to a terminal model answer.
    ///
    /// On any error the history is exactly as it was before the call.
    pub async fn submit(&mut self, user_text: &str) -> Result<(), AgentError> {
        if user_text.trim().is_empty() {
            return Err(AgentError::EmptyPrompt);
        }

        let history_len_before = self.history.len();
        let result = self.run_turn(user_text).await;

        if let Err(e) = &result {
            self.history.truncate(history_len_before);
            match e {
                AgentError::Cancelled => self.emit(UiEvent::Cancelled).await,
                _ => {
                    self.emit(UiEvent::Error {
                        message: e.to_string(),
                    })
                    .await
                }
            }
        }

        result
    }

    async fn run_turn(&mut self, user_text: &str) -> Result<(), AgentError> {
        self.history.push(Content::user_text(user_text));
        self.emit(UiEvent::UserTurnAdded {
            text: user_text.to_string(),
        })
        .await;

        let mut turn_usage = TokenUsage::default();

        for iteration in 0..self.config.max_iterations {
            if self.control.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let request = self.build_request(iteration);
            let deadline = tokio::time::Instant::now() + self.config.request_timeout;

            let (mut stream, used_model) = tokio::time::timeout_at(
                deadline,
                self.fallback.open(self.backend.as_ref(), &request),
            )
            .await
            .map_err(|_| BackendError::Timeout)??;

            if used_model != self.model {
                tracing::info!(from = %self.model, to = %used_model, "sticking with fallback model");
                self.model = used_model;
            }

            let mut buffer = String::new();
            let mut pending: Vec<FunctionCall> = Vec::new();
            let mut saw_done = false;

            'consume: loop {
                // Short receive ticks so a cancel lands within bounded time
                // even while the stream is quiet
                let event = loop {
                    if self.control.is_cancelled() {
                        return Err(AgentError::Cancelled);
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(AgentError::Backend(BackendError::Timeout));
                    }
                    match tokio::time::timeout(RECV_POLL_INTERVAL, stream.recv()).await {
                        Ok(Some(event)) => break event,
                        Ok(None) => break 'consume,
                        Err(_) => continue,
                    }
                };

                match event {
                    StreamEvent::TextChunk(text) => {
                        self.emit(UiEvent::ModelTextChunk { text: text.clone() }).await;
                        buffer.push_str(&text);
                    }
                    StreamEvent::ToolCall(call) => {
                        self.emit(UiEvent::ToolCallStarted {
                            name: call.name.clone(),
                            summary: summarize_args(&call.args),
                        })
                        .await;
                        pending.push(call);
                    }
                    StreamEvent::Done { usage } => {
                        if let Some(usage) = usage {
                            turn_usage += usage;
                            self.tokens += usage;
                        }
                        saw_done = true;
                    }
                    StreamEvent::Error { message } => {
                        return Err(AgentError::Backend(BackendError::Stream(message)));
                    }
                }
            }

            let had_text = !buffer.is_empty();
            if had_text {
                // Text precedes tool calls in conversational order, stored
                // as its own model turn
                self.history.push(Content::model_text(buffer));
            }

            if pending.is_empty() {
                // A done is synthesized when the stream dropped mid-text
                if saw_done || had_text {
                    self.emit(UiEvent::Done { usage: turn_usage }).await;
                }
                self.autosave();
                return Ok(());
            }

            for call in pending {
                if self.control.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                self.handle_tool_call(call).await;
            }
        }

        Err(AgentError::IterationLimitExceeded(self.config.max_iterations))
    }

    fn build_request(&self, iteration: usize) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            project: self.config.project.clone(),
            user_prompt_id: format!("gmn-chat-{}-{}", nanos_now(), iteration),
            contents: self.history.clone(),
            config: self.config.generation,
            tools: self.registry.declarations(),
        }
    }

    /// Resolve, gate, execute, and commit one pending call; the
    /// call/response pair lands in history in order
    async fn handle_tool_call(&mut self, call: FunctionCall) {
        let response_id = call
            .id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", call.name, nanos_now()));

        let Some(tool) = self.registry.get(&call.name) else {
            let result = error_map(format!("unknown tool: {}", call.name));
            self.commit_tool_turn(call, response_id, result, ToolCallStatus::Error)
                .await;
            return;
        };

        if tool.requires_confirmation() && !self.gate.bypasses(&call.name) {
            let request = self.build_confirmation(tool.as_ref(), &call);
            if self.gate.evaluate(&request).await == Outcome::Cancel {
                let result = error_map("operation cancelled by user".to_string());
                self.commit_tool_turn(call, response_id, result, ToolCallStatus::Cancelled)
                    .await;
                return;
            }
        }

        let result = match tool.execute(&call.args).await {
            Ok(map) => map,
            Err(e) => error_map(e.to_string()),
        };

        let status = if result.contains_key("error") {
            ToolCallStatus::Error
        } else {
            ToolCallStatus::Success
        };
        self.commit_tool_turn(call, response_id, result, status)
            .await;
    }

    /// Append the model turn carrying the original call part (signature
    /// preserved) followed by the user turn carrying the response
    async fn commit_tool_turn(
        &mut self,
        call: FunctionCall,
        response_id: String,
        result: JsonMap,
        status: ToolCallStatus,
    ) {
        let name = call.name.clone();
        let info = result_info(&result, status);

        self.history.push(Content::model_call(call));
        self.history.push(Content::user_response(FunctionResponse {
            id: response_id,
            name: name.clone(),
            response: result,
        }));

        self.emit(UiEvent::ToolCallFinished { name, status, info }).await;
    }

    fn build_confirmation(&self, tool: &dyn Tool, call: &FunctionCall) -> ConfirmationRequest {
        let arg_str = |key: &str| {
            call.args
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let (original_content, new_content) =
            if tool.confirmation_category() == ConfirmationCategory::Edit {
                match tool.diff_preview() {
                    Some(preview) => (
                        preview.original_content(&call.args).ok(),
                        preview.new_content(&call.args).ok(),
                    ),
                    None => (None, None),
                }
            } else {
                (None, None)
            };

        ConfirmationRequest {
            category: tool.confirmation_category(),
            tool_name: tool.name().to_string(),
            title: format!("Allow {}?", tool.display_name()),
            file_path: arg_str("path"),
            url: arg_str("url"),
            command: arg_str("command"),
            original_content,
            new_content,
            args: call.args.clone(),
        }
    }

    /// Persist after a clean turn; persistence failures never fail the turn
    fn autosave(&mut self) {
        if self.store.is_some() {
            if let Err(e) = self.save_session() {
                tracing::warn!(error = %e, "failed to save session");
            }
        }
    }

    async fn emit(&self, event: UiEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event).await;
        }
    }
}

fn no_store() -> AgentError {
    AgentError::Session(crate::SessionError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no session store configured",
    )))
}

fn error_map(message: String) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert("error".to_string(), json!(message));
    map
}

/// Short result summary for the finished-call notice
fn result_info(result: &JsonMap, status: ToolCallStatus) -> String {
    if status == ToolCallStatus::Cancelled {
        return "operation cancelled by user".to_string();
    }
    if let Some(error) = result.get("error").and_then(Value::as_str) {
        return error.to_string();
    }
    if let Some(count) = result.get("count").and_then(Value::as_u64) {
        return format!("({count} items)");
    }
    if let Some(message) = result.get("message").and_then(Value::as_str) {
        let mut info = message.to_string();
        if info.chars().count() > 50 {
            info = info.chars().take(47).collect::<String>() + "...";
        }
        return info;
    }
    String::new()
}

fn nanos_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
