//! Streaming HTTP client
//!
//! A reader task decodes SSE chunks and pushes `StreamEvent`s onto a
//! bounded channel; the consumer side is `EventStream`. Dropping the
//! stream stops the reader within one send.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

use gmn_protocol::{GenerateRequest, StreamEvent};

use crate::{wire, BackendError, CredentialsProvider};

const DEFAULT_BASE_URL: &str = "https://cloudcode-pa.googleapis.com";
const STREAM_PATH: &str = "/v1internal:streamGenerateContent?alt=sse";
const EVENT_CHANNEL_CAPACITY: usize = 32;
const MAX_SSE_BUFFER: usize = 10 * 1024 * 1024;

/// A streaming generative-content backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Open one backend call; events arrive in model order and the stream
    /// always ends (done, error, or channel close)
    async fn generate_stream(&self, req: &GenerateRequest) -> Result<EventStream, BackendError>;
}

/// Ordered consumer side of one backend call.
///
/// Supports pushing an event back after peeking, which the fallback policy
/// uses to probe the first event without losing it.
pub struct EventStream {
    pending: VecDeque<StreamEvent>,
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    pub fn new(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            pending: VecDeque::new(),
            rx,
        }
    }

    /// A pre-scripted stream; used by mock backends in tests
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            pending: events.into(),
            rx,
        }
    }

    pub fn push_front(&mut self, event: StreamEvent) {
        self.pending.push_front(event);
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        self.rx.recv().await
    }
}

/// HTTP/SSE implementation of `BackendClient`
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialsProvider>,
}

impl HttpClient {
    pub fn new(credentials: Arc<dyn CredentialsProvider>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Extract the payload from one SSE event block (joined `data:` lines)
    fn parse_sse_event_payload(event: &str) -> Option<String> {
        let mut payload_lines = Vec::new();
        for raw_line in event.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("data:") {
                payload_lines.push(rest.trim_start().to_string());
            }
        }

        if payload_lines.is_empty() {
            None
        } else {
            Some(payload_lines.join("\n"))
        }
    }

    fn decode_payload(payload: &str) -> Result<Vec<StreamEvent>, BackendError> {
        let chunk: wire::WireChunk = serde_json::from_str(payload)
            .map_err(|e| BackendError::Decode(format!("bad stream chunk: {e}")))?;
        Ok(chunk.into_body().into_events())
    }
}

#[async_trait]
impl BackendClient for HttpClient {
    async fn generate_stream(&self, req: &GenerateRequest) -> Result<EventStream, BackendError> {
        let token = self.credentials.access_token().await?;
        let body = wire::encode_request(req);
        let url = format!("{}{}", self.base_url, STREAM_PATH);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = message.chars().take(512).collect::<String>();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(BackendError::Auth(format!("{status}: {message}")));
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();

            while let Some(result) = byte_stream.next().await {
                let bytes = match result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: format!("stream error: {e}"),
                            })
                            .await;
                        return;
                    }
                };

                let text = String::from_utf8_lossy(&bytes);
                let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
                buffer.push_str(&normalized);

                if buffer.len() > MAX_SSE_BUFFER {
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: "SSE buffer exceeded maximum size".to_string(),
                        })
                        .await;
                    return;
                }

                while let Some(pos) = buffer.find("\n\n") {
                    let event = buffer[..pos].to_string();
                    buffer.drain(..pos + 2);

                    let Some(payload) = Self::parse_sse_event_payload(&event) else {
                        continue;
                    };
                    if payload == "[DONE]" {
                        return;
                    }

                    match Self::decode_payload(&payload) {
                        Ok(events) => {
                            for event in events {
                                if tx.send(event).await.is_err() {
                                    // Receiver dropped: caller cancelled
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx
                                .send(StreamEvent::Error {
                                    message: e.to_string(),
                                })
                                .await;
                            return;
                        }
                    }
                }
            }

            // Flush a trailing event block without the blank-line terminator
            let remaining = buffer.trim();
            if !remaining.is_empty() {
                if let Some(payload) = Self::parse_sse_event_payload(remaining) {
                    if payload != "[DONE]" {
                        if let Ok(events) = Self::decode_payload(&payload) {
                            for event in events {
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(EventStream::new(rx))
    }
}
