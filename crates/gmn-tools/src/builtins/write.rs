//! write_file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::fs;

use gmn_protocol::JsonMap;

use crate::traits::{require_str, resolve_path};
use crate::{ConfirmationCategory, DiffPreview, Tool, ToolError};

pub struct WriteFileTool {
    root_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn display_name(&self) -> &str {
        "WriteFile"
    }

    fn description(&self) -> &str {
        "Write content to a file at the specified path. If the file exists, it will be overwritten. If it doesn't exist, it will be created."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn confirmation_category(&self) -> ConfirmationCategory {
        ConfirmationCategory::Edit
    }

    fn diff_preview(&self) -> Option<&dyn DiffPreview> {
        Some(self)
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let path = require_str(args, "path")?;
        let content = require_str(args, "content")?;
        let full_path = resolve_path(&self.root_dir, path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Failed(format!("failed to create directory: {e}")))?;
        }

        fs::write(&full_path, content)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to write file: {e}")))?;

        let mut result = JsonMap::new();
        result.insert("success".to_string(), json!(true));
        result.insert("path".to_string(), json!(full_path.display().to_string()));
        result.insert(
            "message".to_string(),
            json!(format!(
                "Successfully wrote {} bytes to {}",
                content.len(),
                full_path.display()
            )),
        );
        Ok(result)
    }
}

impl DiffPreview for WriteFileTool {
    fn original_content(&self, args: &JsonMap) -> Result<String, ToolError> {
        let path = require_str(args, "path")?;
        let full_path = resolve_path(&self.root_dir, path);
        match std::fs::read_to_string(&full_path) {
            Ok(content) => Ok(content),
            // New file: empty original side
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ToolError::Failed(format!("failed to read file: {e}"))),
        }
    }

    fn new_content(&self, args: &JsonMap) -> Result<String, ToolError> {
        Ok(require_str(args, "content")?.to_string())
    }
}
