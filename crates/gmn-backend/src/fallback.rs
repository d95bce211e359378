//! Model fallback on retryable errors
//!
//! The policy tries the preferred model first and rotates through the
//! fallback chain when a stream fails to open, or errors before the first
//! successful chunk. Once any text or tool call has been emitted the
//! attempt is committed and later errors propagate as-is.

use gmn_protocol::{GenerateRequest, StreamEvent};

use crate::{BackendClient, BackendError, EventStream};

const RETRYABLE_MARKERS: &[&str] = &[
    "429",
    "404",
    "503",
    "resource_exhausted",
    "unavailable",
    "not_found",
    "model not found",
];

/// Whether an error message indicates rate limiting, service
/// unavailability, or a model the account's tier cannot reach
pub fn is_retryable(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    models: Vec<String>,
}

impl FallbackPolicy {
    pub fn new(models: Vec<String>) -> Self {
        Self { models }
    }

    /// Candidate order for one call: the preferred model, then the
    /// configured chain with duplicates removed
    pub fn chain_for(&self, preferred: &str) -> Vec<String> {
        let mut chain = vec![preferred.to_string()];
        for model in &self.models {
            if !chain.iter().any(|m| m == model) {
                chain.push(model.clone());
            }
        }
        chain
    }

    /// Open a stream, rotating models on retryable failures.
    ///
    /// Returns the stream together with the model that actually served it
    /// so the caller can stick with a fallback for later turns.
    pub async fn open(
        &self,
        client: &dyn BackendClient,
        req: &GenerateRequest,
    ) -> Result<(EventStream, String), BackendError> {
        let chain = self.chain_for(&req.model);
        let last = chain.len() - 1;

        for (attempt, model) in chain.iter().enumerate() {
            let mut candidate = req.clone();
            candidate.model = model.clone();

            let mut stream = match client.generate_stream(&candidate).await {
                Ok(stream) => stream,
                Err(e) if e.is_retryable() && attempt < last => {
                    tracing::warn!(model = %model, error = %e, "model failed, trying fallback");
                    continue;
                }
                Err(e) => return Err(e),
            };

            // Probe the first event: an immediate retryable error still
            // rotates; anything else commits this attempt.
            match stream.recv().await {
                Some(StreamEvent::Error { message })
                    if is_retryable(&message) && attempt < last =>
                {
                    tracing::warn!(model = %model, error = %message, "stream failed before first chunk");
                    continue;
                }
                Some(event) => {
                    stream.push_front(event);
                    return Ok((stream, model.clone()));
                }
                None => return Ok((stream, model.clone())),
            }
        }

        Err(BackendError::FallbackExhausted)
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-flash-lite".to_string(),
        ])
    }
}
