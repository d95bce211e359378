//! Backend request types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Content;

/// A single generate-content call: full history plus generation settings
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub project: String,
    /// Unique per backend call, `gmn-chat-<nanos>-<iter>` in the chat loop
    pub user_prompt_id: String,
    pub contents: Vec<Content>,
    pub config: GenerationConfig,
    pub tools: Vec<ToolDecl>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }
}

/// A tool made available to the model: name, description, JSON-schema params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDecl {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}
