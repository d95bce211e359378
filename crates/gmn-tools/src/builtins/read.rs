//! read_file tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::fs;

use gmn_protocol::JsonMap;

use crate::traits::{require_str, resolve_path};
use crate::{Tool, ToolError};

pub struct ReadFileTool {
    root_dir: PathBuf,
}

impl ReadFileTool {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn display_name(&self) -> &str {
        "ReadFile"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the specified path. Use this when you need to examine the contents of an existing file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to read (relative to working directory or absolute)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let path = require_str(args, "path")?;
        let full_path = resolve_path(&self.root_dir, path);

        let content = fs::read_to_string(&full_path)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to read file: {e}")))?;

        let mut result = JsonMap::new();
        result.insert("content".to_string(), json!(content));
        result.insert("path".to_string(), json!(full_path.display().to_string()));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn args(value: Value) -> JsonMap {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("a.txt")).unwrap();
        write!(file, "hello").unwrap();

        let tool = ReadFileTool::new(dir.path());
        let result = tool.execute(&args(json!({"path": "a.txt"}))).await.unwrap();

        assert_eq!(result["content"], "hello");
        assert!(result["path"].as_str().unwrap().ends_with("a.txt"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(dir.path());
        let result = tool.execute(&args(json!({"path": "nope.txt"}))).await;
        assert!(matches!(result, Err(ToolError::Failed(_))));
    }

    #[tokio::test]
    async fn missing_path_arg_is_invalid() {
        let tool = ReadFileTool::new(".");
        let result = tool.execute(&args(json!({}))).await;
        assert!(matches!(result, Err(ToolError::InvalidArgs(_))));
    }
}
