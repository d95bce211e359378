//! list_directory tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::fs;

use gmn_protocol::JsonMap;

use crate::traits::{require_str, resolve_path};
use crate::{Tool, ToolError};

pub struct ListDirectoryTool {
    root_dir: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn display_name(&self) -> &str {
        "ReadFolder"
    }

    fn description(&self) -> &str {
        "List the contents of a directory. Returns file and subdirectory names."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the directory to list (relative to working directory or absolute)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let path = require_str(args, "path")?;
        let full_path = resolve_path(&self.root_dir, path);

        let mut dir = fs::read_dir(&full_path)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to read directory: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "isDir": metadata.is_dir(),
                "size": metadata.len(),
            }));
        }

        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        let mut result = JsonMap::new();
        result.insert("path".to_string(), json!(full_path.display().to_string()));
        result.insert("entries".to_string(), json!(entries));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn lists_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), "1234").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let tool = ListDirectoryTool::new(dir.path());
        let result = tool.execute(&args(json!({"path": "."}))).await.unwrap();

        let entries = result["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "file.txt");
        assert_eq!(entries[0]["isDir"], false);
        assert_eq!(entries[0]["size"], 4);
        assert_eq!(entries[1]["name"], "sub");
        assert_eq!(entries[1]["isDir"], true);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let tool = ListDirectoryTool::new("/");
        let result = tool.execute(&args(json!({"path": "/no/such/dir"}))).await;
        assert!(matches!(result, Err(ToolError::Failed(_))));
    }
}
