//! edit_file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::fs;

use gmn_protocol::JsonMap;

use crate::traits::{require_str, resolve_path};
use crate::{ConfirmationCategory, DiffPreview, Tool, ToolError};

pub struct EditFileTool {
    root_dir: PathBuf,
}

impl EditFileTool {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn apply(content: &str, old_text: &str, new_text: &str) -> Result<String, ToolError> {
        if !content.contains(old_text) {
            return Err(ToolError::Failed("old_text not found in file".to_string()));
        }
        Ok(content.replacen(old_text, new_text, 1))
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn display_name(&self) -> &str {
        "Edit"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing specific text. Provide the old text to find and the new text to replace it with."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to edit"
                },
                "old_text": {
                    "type": "string",
                    "description": "The exact text to find and replace"
                },
                "new_text": {
                    "type": "string",
                    "description": "The text to replace with"
                }
            },
            "required": ["path", "old_text", "new_text"]
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
        let old_text = require_str(args, "old_text")?;
        let new_text = require_str(args, "new_text")?;
        let full_path = resolve_path(&self.root_dir, path);

        let content = fs::read_to_string(&full_path)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to read file: {e}")))?;

        let new_content = Self::apply(&content, old_text, new_text)?;

        fs::write(&full_path, new_content)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to write file: {e}")))?;

        let mut result = JsonMap::new();
        result.insert("success".to_string(), json!(true));
        result.insert("path".to_string(), json!(full_path.display().to_string()));
        result.insert("message".to_string(), json!("Successfully edited file"));
        Ok(result)
    }
}

impl DiffPreview for EditFileTool {
    fn original_content(&self, args: &JsonMap) -> Result<String, ToolError> {
        let path = require_str(args, "path")?;
        let full_path = resolve_path(&self.root_dir, path);
        std::fs::read_to_string(&full_path)
            .map_err(|e| ToolError::Failed(format!("failed to read file: {e}")))
    }

    fn new_content(&self, args: &JsonMap) -> Result<String, ToolError> {
        let old_text = require_str(args, "old_text")?;
        let new_text = require_str(args, "new_text")?;
        let content = self.original_content(args)?;
        Self::apply(&content, old_text, new_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn replaces_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "foo bar foo").unwrap();

        let tool = EditFileTool::new(dir.path());
        let result = tool
            .execute(&args(
                json!({"path": "f.txt", "old_text": "foo", "new_text": "qux"}),
            ))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "qux bar foo"
        );
    }

    #[tokio::test]
    async fn old_text_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "content").unwrap();

        let tool = EditFileTool::new(dir.path());
        let result = tool
            .execute(&args(
                json!({"path": "f.txt", "old_text": "absent", "new_text": "x"}),
            ))
            .await;

        match result {
            Err(ToolError::Failed(msg)) => assert_eq!(msg, "old_text not found in file"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn diff_preview_shows_applied_edit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "line one\nline two\n").unwrap();

        let tool = EditFileTool::new(dir.path());
        let call_args = args(json!({"path": "f.txt", "old_text": "two", "new_text": "2"}));

        assert_eq!(
            tool.original_content(&call_args).unwrap(),
            "line one\nline two\n"
        );
        assert_eq!(tool.new_content(&call_args).unwrap(), "line one\nline 2\n");
        // The file itself is untouched by preview
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "line one\nline two\n"
        );
    }
}
