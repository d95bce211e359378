//! Confirmation gate
//!
//! Policy layer between the loop and the user: a global yolo bypass, a
//! per-session allow-list, and delegation to the presentation layer for
//! everything else.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use gmn_protocol::JsonMap;
use gmn_tools::ConfirmationCategory;

/// Result of a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Execute this time only
    ProceedOnce,
    /// Always allow this tool for the rest of the session
    ProceedAlways,
    /// Cancel the operation
    Cancel,
}

/// Everything the UI needs to present one pending tool call
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub category: ConfirmationCategory,
    pub tool_name: String,
    pub title: String,
    pub file_path: Option<String>,
    pub url: Option<String>,
    pub command: Option<String>,
    /// Populated for edit-category requests
    pub original_content: Option<String>,
    pub new_content: Option<String>,
    pub args: JsonMap,
}

/// Presentation boundary: shows a request, returns the user's decision.
///
/// Implementations map presentation failures to `Cancel`.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> Outcome;
}

pub struct ConfirmationGate {
    yolo: bool,
    allow_list: HashSet<String>,
    prompt: Arc<dyn ConfirmationPrompt>,
}

impl ConfirmationGate {
    pub fn new(yolo: bool, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        Self {
            yolo,
            allow_list: HashSet::new(),
            prompt,
        }
    }

    pub fn is_allowed(&self, tool_name: &str) -> bool {
        self.allow_list.contains(tool_name)
    }

    pub fn allow(&mut self, tool_name: impl Into<String>) {
        self.allow_list.insert(tool_name.into());
    }

    /// True when a call to this tool would proceed without consulting the
    /// user (yolo or previously allowed)
    pub fn bypasses(&self, tool_name: &str) -> bool {
        self.yolo || self.allow_list.contains(tool_name)
    }

    /// Decide a pending tool call. `ProceedAlways` adds the tool to the
    /// allow-list before returning, so callers can treat it as a proceed.
    pub async fn evaluate(&mut self, request: &ConfirmationRequest) -> Outcome {
        if self.yolo {
            return Outcome::ProceedOnce;
        }
        if self.allow_list.contains(&request.tool_name) {
            return Outcome::ProceedOnce;
        }

        let outcome = self.prompt.confirm(request).await;
        if outcome == Outcome::ProceedAlways {
            self.allow_list.insert(request.tool_name.clone());
        }
        outcome
    }
}
