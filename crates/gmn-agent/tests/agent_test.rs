//! Agent loop integration tests
//!
//! Covers the end-to-end scenarios and history invariants: plain turns,
//! tool execution with confirmation, fallback rotation, iteration bounds,
//! and atomic rollback.

mod mock_backend;

use async_trait::async_trait;
use mock_backend::MockBackend;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gmn_agent::{
    AgentConfig, AgentError, AgentLoop, ConfirmationGate, ConfirmationPrompt, ConfirmationRequest,
    EventStream, Outcome, ToolCallStatus, UiEvent,
};
use gmn_backend::{BackendError, FallbackPolicy};
use gmn_protocol::{Content, FunctionCall, JsonMap, Part, Role, StreamEvent, TokenUsage};
use gmn_tools::ToolRegistry;

struct ScriptedPrompt {
    outcomes: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationPrompt for ScriptedPrompt {
    async fn confirm(&self, _request: &ConfirmationRequest) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::ProceedOnce)
    }
}

fn args(value: serde_json::Value) -> JsonMap {
    value.as_object().unwrap().clone()
}

fn make_agent(
    backend: Arc<MockBackend>,
    root: &Path,
    outcomes: Vec<Outcome>,
) -> (AgentLoop, Arc<ScriptedPrompt>) {
    let prompt = ScriptedPrompt::new(outcomes);
    let gate = ConfirmationGate::new(false, prompt.clone());
    let registry = ToolRegistry::new(root);
    let config = AgentConfig {
        project: "proj".to_string(),
        ..Default::default()
    };

    let agent = AgentLoop::new("m-pro", backend, registry, gate, config).with_fallback(
        FallbackPolicy::new(vec!["m-pro".to_string(), "m-flash".to_string()]),
    );
    (agent, prompt)
}

fn collect_events(stream: EventStream) -> tokio::task::JoinHandle<Vec<UiEvent>> {
    tokio::spawn(async move {
        let mut stream = stream;
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    })
}

fn call_part(content: &Content) -> &FunctionCall {
    content.parts[0]
        .as_function_call()
        .expect("expected a function_call part")
}

fn response_part(content: &Content) -> &gmn_protocol::FunctionResponse {
    content.parts[0]
        .as_function_response()
        .expect("expected a function_response part")
}

/// I1: call ids pair with response ids, in order, exactly once
fn assert_pairing(history: &[Content]) {
    let call_ids: Vec<&str> = history
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.as_function_call())
        .map(|fc| fc.id.as_deref().unwrap_or(""))
        .collect();
    let response_ids: Vec<&str> = history
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.as_function_response())
        .map(|fr| fr.id.as_str())
        .collect();
    assert_eq!(call_ids, response_ids);
}

#[tokio::test]
async fn s1_plain_turn() {
    let backend = Arc::new(MockBackend::new());
    backend.queue_events(vec![
        StreamEvent::TextChunk("hello".to_string()),
        StreamEvent::TextChunk(" world".to_string()),
        StreamEvent::Done {
            usage: Some(TokenUsage::new(3, 2)),
        },
    ]);

    let dir = tempfile::tempdir().unwrap();
    let (agent, _) = make_agent(backend.clone(), dir.path(), vec![]);
    let (mut agent, events) = agent.with_event_stream();
    let events = collect_events(events);

    agent.submit("say hi").await.unwrap();

    assert_eq!(agent.history().len(), 2);
    assert_eq!(agent.history()[0], Content::user_text("say hi"));
    assert_eq!(agent.history()[1], Content::model_text("hello world"));
    assert_eq!(agent.tokens(), TokenUsage::new(3, 2));
    assert_eq!(backend.call_count(), 1);

    drop(agent);
    let events = events.await.unwrap();
    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            UiEvent::ModelTextChunk { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["hello", " world"]);
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::Done { usage } if *usage == TokenUsage::new(3, 2))));
}

#[tokio::test]
async fn s2_single_tool_with_signature_preserved() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "hi").unwrap();

    let backend = Arc::new(MockBackend::new());
    backend.queue_tool_call(
        FunctionCall::new("read_file", args(serde_json::json!({"path": "a.txt"})))
            .with_id("c1")
            .with_signature("sig-bytes"),
    );
    backend.queue_text("contents: hi", TokenUsage::new(5, 3));

    let (agent, _) = make_agent(backend.clone(), dir.path(), vec![]);
    let (mut agent, events) = agent.with_event_stream();
    let events = collect_events(events);

    agent.submit("read ./a.txt").await.unwrap();

    let history = agent.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0], Content::user_text("read ./a.txt"));

    // I2: the committed call part is byte-identical, signature included
    let fc = call_part(&history[1]);
    assert_eq!(history[1].role, Role::Model);
    assert_eq!(fc.name, "read_file");
    assert_eq!(fc.thought_signature.as_deref(), Some("sig-bytes"));

    let fr = response_part(&history[2]);
    assert_eq!(history[2].role, Role::User);
    assert_eq!(fr.id, "c1");
    assert_eq!(fr.name, "read_file");
    assert_eq!(fr.response["content"], "hi");

    assert_eq!(history[3], Content::model_text("contents: hi"));
    assert_pairing(history);

    // The second request carries the tool turns back to the backend
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].user_prompt_id.starts_with("gmn-chat-"));
    assert!(requests[0].user_prompt_id.ends_with("-0"));
    assert!(requests[1].user_prompt_id.ends_with("-1"));
    assert_eq!(requests[1].contents.len(), 3);

    drop(agent);
    let events = events.await.unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::ToolCallStarted { name, summary } if name == "read_file" && summary == "a.txt"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::ToolCallFinished { status: ToolCallStatus::Success, .. }
    )));
}

#[tokio::test]
async fn s3_cancelled_confirmation_continues_turn() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_tool_call(
        FunctionCall::new("shell", args(serde_json::json!({"command": "rm -rf /"})))
            .with_id("c1"),
    );
    backend.queue_text("ok, I won't.", TokenUsage::new(4, 4));

    let (mut agent, prompt) = make_agent(backend, dir.path(), vec![Outcome::Cancel]);

    agent.submit("delete all").await.unwrap();

    let history = agent.history();
    assert_eq!(history.len(), 4);
    let fr = response_part(&history[2]);
    assert_eq!(fr.response["error"], "operation cancelled by user");
    assert_eq!(history[3], Content::model_text("ok, I won't."));
    assert_eq!(prompt.call_count(), 1);
    // I5: cancel does not touch the allow-list
    assert!(!agent.gate_mut().is_allowed("shell"));
}

#[tokio::test]
async fn s4_fallback_rotates_and_sticks() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_open_error(BackendError::Api {
        status: 429,
        message: "quota".to_string(),
    });
    backend.queue_text("ok", TokenUsage::new(1, 1));

    let (mut agent, _) = make_agent(backend.clone(), dir.path(), vec![]);
    agent.submit("x").await.unwrap();

    assert_eq!(agent.model(), "m-flash");
    assert_eq!(agent.history().len(), 2);
    assert_eq!(agent.history()[1], Content::model_text("ok"));

    let models: Vec<String> = backend.requests().into_iter().map(|r| r.model).collect();
    assert_eq!(models, vec!["m-pro", "m-flash"]);
}

#[tokio::test]
async fn s5_iteration_cap_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    for i in 0..10 {
        backend.queue_tool_call(
            FunctionCall::new("no_such_tool", JsonMap::new()).with_id(format!("c{i}")),
        );
    }

    let (mut agent, _) = make_agent(backend.clone(), dir.path(), vec![]);
    let err = agent.submit("loop forever").await.unwrap_err();
    assert!(matches!(err, AgentError::IterationLimitExceeded(10)));
    assert_eq!(err.to_string(), "max tool iterations (10) reached");
    // I3/I7: exactly ten backend calls, history rolled back to empty
    assert_eq!(backend.call_count(), 10);
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn fallback_exhaustion_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_open_error(BackendError::Api {
        status: 429,
        message: "quota".to_string(),
    });
    backend.queue_open_error(BackendError::Api {
        status: 503,
        message: "down".to_string(),
    });

    let (mut agent, _) = make_agent(backend, dir.path(), vec![]);
    let result = agent.submit("x").await;

    assert!(matches!(result, Err(AgentError::Backend(_))));
    assert!(agent.history().is_empty());
}

#[tokio::test]
async fn stream_without_done_still_appends_text() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_events(vec![StreamEvent::TextChunk("partial answer".to_string())]);

    let (agent, _) = make_agent(backend, dir.path(), vec![]);
    let (mut agent, events) = agent.with_event_stream();
    let events = collect_events(events);

    agent.submit("hi").await.unwrap();

    assert_eq!(agent.history().len(), 2);
    assert_eq!(agent.history()[1], Content::model_text("partial answer"));

    drop(agent);
    // A synthetic done closes the turn even though the backend never sent one
    let events = events.await.unwrap();
    assert!(events.iter().any(|e| matches!(e, UiEvent::Done { .. })));
}

#[tokio::test]
async fn empty_stream_appends_no_model_turn() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_events(vec![StreamEvent::Done { usage: None }]);

    let (mut agent, _) = make_agent(backend, dir.path(), vec![]);
    agent.submit("hi").await.unwrap();

    assert_eq!(agent.history().len(), 1);
    assert_eq!(agent.history()[0].role, Role::User);
}

#[cfg(unix)]
#[tokio::test]
async fn rejecting_first_of_two_calls_still_runs_second() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_events(vec![
        StreamEvent::ToolCall(
            FunctionCall::new("shell", args(serde_json::json!({"command": "echo one"})))
                .with_id("c1"),
        ),
        StreamEvent::ToolCall(
            FunctionCall::new("shell", args(serde_json::json!({"command": "echo two"})))
                .with_id("c2"),
        ),
        StreamEvent::Done {
            usage: Some(TokenUsage::new(8, 6)),
        },
    ]);
    backend.queue_text("done", TokenUsage::new(2, 1));

    let (mut agent, _) = make_agent(
        backend,
        dir.path(),
        vec![Outcome::Cancel, Outcome::ProceedOnce],
    );
    agent.submit("run both").await.unwrap();

    let history = agent.history();
    // user, fc(c1), fr(c1 cancelled), fc(c2), fr(c2 ok), model text
    assert_eq!(history.len(), 6);
    assert_eq!(response_part(&history[2]).id, "c1");
    assert_eq!(
        response_part(&history[2]).response["error"],
        "operation cancelled by user"
    );
    assert_eq!(response_part(&history[4]).id, "c2");
    assert_eq!(
        response_part(&history[4]).response["stdout"]
            .as_str()
            .unwrap()
            .trim(),
        "two"
    );
    assert_pairing(history);
}

#[tokio::test]
async fn text_turn_precedes_tool_call_turn() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_events(vec![
        StreamEvent::TextChunk("let me look".to_string()),
        StreamEvent::ToolCall(FunctionCall::new("no_such_tool", JsonMap::new()).with_id("c1")),
        StreamEvent::Done {
            usage: Some(TokenUsage::new(1, 1)),
        },
    ]);
    backend.queue_text("found it", TokenUsage::new(1, 1));

    let (mut agent, _) = make_agent(backend, dir.path(), vec![]);
    agent.submit("look around").await.unwrap();

    let history = agent.history();
    // I4: mixed text+tool turns split, text first
    assert_eq!(history.len(), 5);
    assert_eq!(history[1], Content::model_text("let me look"));
    assert!(matches!(history[2].parts[0], Part::FunctionCall(_)));
    assert!(matches!(history[3].parts[0], Part::FunctionResponse(_)));
}

#[tokio::test]
async fn unknown_tool_reports_error_response() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_tool_call(FunctionCall::new("bogus", JsonMap::new()).with_id("c1"));
    backend.queue_text("sorry", TokenUsage::new(1, 1));

    let (mut agent, _) = make_agent(backend, dir.path(), vec![]);
    agent.submit("use bogus").await.unwrap();

    let fr = response_part(&agent.history()[2]);
    assert_eq!(fr.response["error"], "unknown tool: bogus");
}

#[tokio::test]
async fn tool_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_tool_call(
        FunctionCall::new("read_file", args(serde_json::json!({"path": "missing.txt"})))
            .with_id("c1"),
    );
    backend.queue_text("that file does not exist", TokenUsage::new(1, 1));

    let (mut agent, _) = make_agent(backend, dir.path(), vec![]);
    agent.submit("read it").await.unwrap();

    let fr = response_part(&agent.history()[2]);
    assert!(fr.response["error"]
        .as_str()
        .unwrap()
        .starts_with("failed to read file"));
    assert_eq!(
        agent.history()[3],
        Content::model_text("that file does not exist")
    );
}

#[tokio::test]
async fn generated_response_id_uses_name_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    // No id on the call: the loop must mint one and round-trip it
    backend.queue_tool_call(FunctionCall::new("no_such_tool", JsonMap::new()));
    backend.queue_text("ok", TokenUsage::new(1, 1));

    let (mut agent, _) = make_agent(backend, dir.path(), vec![]);
    agent.submit("go").await.unwrap();

    let fr = response_part(&agent.history()[2]);
    assert!(fr.id.starts_with("no_such_tool-"));
}

#[cfg(unix)]
#[tokio::test]
async fn proceed_always_feeds_allow_list() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_tool_call(
        FunctionCall::new("shell", args(serde_json::json!({"command": "echo a"}))).with_id("c1"),
    );
    backend.queue_tool_call(
        FunctionCall::new("shell", args(serde_json::json!({"command": "echo b"}))).with_id("c2"),
    );
    backend.queue_text("both ran", TokenUsage::new(1, 1));

    let (mut agent, prompt) = make_agent(backend, dir.path(), vec![Outcome::ProceedAlways]);
    agent.submit("run twice").await.unwrap();

    // I5: one prompt, then the allow-list short-circuits
    assert_eq!(prompt.call_count(), 1);
    assert!(agent.gate_mut().is_allowed("shell"));
    assert_eq!(agent.history().len(), 6);
}

#[tokio::test]
async fn cancellation_rolls_back_turn() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_text("never seen", TokenUsage::new(1, 1));

    let (agent, _) = make_agent(backend, dir.path(), vec![]);
    let (mut agent, events) = agent.with_event_stream();
    let events = collect_events(events);

    agent.control().cancel();
    let result = agent.submit("hello").await;

    assert!(matches!(result, Err(AgentError::Cancelled)));
    assert!(agent.history().is_empty());

    drop(agent);
    let events = events.await.unwrap();
    assert!(events.iter().any(|e| matches!(e, UiEvent::Cancelled)));
}

#[tokio::test]
async fn empty_prompt_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let (mut agent, _) = make_agent(backend.clone(), dir.path(), vec![]);

    let result = agent.submit("   ").await;
    assert!(matches!(result, Err(AgentError::EmptyPrompt)));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn usage_accumulates_across_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.queue_tool_call(FunctionCall::new("no_such_tool", JsonMap::new()).with_id("c1"));
    backend.queue_text("done", TokenUsage::new(7, 3));

    let (mut agent, _) = make_agent(backend, dir.path(), vec![]);
    agent.submit("go").await.unwrap();

    // 10/5 from the tool-call iteration plus 7/3 from the final one
    assert_eq!(agent.tokens(), TokenUsage::new(17, 8));
}
