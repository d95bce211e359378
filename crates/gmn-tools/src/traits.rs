//! Tool trait and shared helpers

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use gmn_protocol::JsonMap;

/// Kind of confirmation a tool needs before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationCategory {
    /// File modification; the prompt shows a diff
    Edit,
    /// Command execution; the prompt shows the command line
    Shell,
    /// Network fetch; the prompt shows the URL
    Fetch,
    /// External tool server call; the prompt shows the argument blob
    Mcp,
    /// No confirmation
    None,
}

/// Errors from tool argument validation or execution.
///
/// The agent loop converts these into an `{"error": ...}` response map, so
/// messages are written for the model, not for a stack trace.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Failed(String),
}

/// A capability the model can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name used in function calls (snake_case)
    fn name(&self) -> &str;

    /// Human-readable name for display
    fn display_name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters
    fn parameters(&self) -> Value;

    fn requires_confirmation(&self) -> bool {
        false
    }

    fn confirmation_category(&self) -> ConfirmationCategory {
        ConfirmationCategory::None
    }

    /// Edit-category tools return themselves here to enable diff preview
    fn diff_preview(&self) -> Option<&dyn DiffPreview> {
        None
    }

    /// Run the tool. On success the returned map is fed to the model as a
    /// function response; failures become an `error`-keyed map upstream.
    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError>;
}

/// Before/after content for the edit confirmation diff
pub trait DiffPreview: Send + Sync {
    fn original_content(&self, args: &JsonMap) -> Result<String, ToolError>;
    fn new_content(&self, args: &JsonMap) -> Result<String, ToolError>;
}

pub(crate) fn require_str<'a>(args: &'a JsonMap, key: &str) -> Result<&'a str, ToolError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        ToolError::InvalidArgs(format!("{key} is required and must be a string"))
    })
}

/// Relative paths resolve against the registry root; absolute paths are
/// used verbatim
pub(crate) fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}
