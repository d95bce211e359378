//! gmn protocol - conversation data model
//!
//! This crate defines the types shared between the agent loop, the backend
//! client, and the tool layer:
//! - Conversation history (`Content`, `Part`)
//! - Streaming events from the backend (`StreamEvent`)
//! - Request types (`GenerateRequest`, `GenerationConfig`, `ToolDecl`)

mod content;
mod request;
mod stream;
mod usage;

pub use content::{Content, FunctionCall, FunctionResponse, Part, Role};
pub use request::{GenerateRequest, GenerationConfig, ToolDecl};
pub use stream::StreamEvent;
pub use usage::TokenUsage;

/// Map type used for tool arguments and tool responses.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
