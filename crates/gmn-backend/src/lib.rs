//! gmn backend - streaming generative-content client
//!
//! Translates a `GenerateRequest` into an ordered, cancellable sequence of
//! `StreamEvent`s over SSE, and rotates through fallback models on
//! retryable failures.

mod auth;
mod client;
mod error;
mod fallback;
mod wire;

pub use auth::{CredentialsProvider, StoredCredentials};
pub use client::{BackendClient, EventStream, HttpClient};
pub use error::BackendError;
pub use fallback::{is_retryable, FallbackPolicy};
