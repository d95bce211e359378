//! gmn tools - built-in tool capability objects
//!
//! Each tool exposes a name, JSON-schema parameters, a confirmation
//! category, and an async `execute` over a JSON argument map. Edit-category
//! tools additionally provide before/after content for diff preview.

mod builtins;
mod output;
mod registry;
mod traits;

pub use builtins::shell::default_shell;
pub use output::truncate_output;
pub use registry::ToolRegistry;
pub use traits::{ConfirmationCategory, DiffPreview, Tool, ToolError};
