//! gmn agent - the conversation-state machine
//!
//! This crate owns the hard part of the system: interleaving streamed model
//! output, tool-call parsing, user-in-the-loop confirmation, tool execution,
//! and history management, with atomic rollback on failed turns.

mod agent;
mod confirm;
mod control;
mod error;
mod events;
mod session;

pub use agent::{AgentConfig, AgentLoop};
pub use confirm::{ConfirmationGate, ConfirmationPrompt, ConfirmationRequest, Outcome};
pub use control::AgentControl;
pub use error::AgentError;
pub use events::{summarize_args, EventSender, EventStream, ToolCallStatus, UiEvent};
pub use session::{Session, SessionError, SessionStore};
