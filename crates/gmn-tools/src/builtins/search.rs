//! search_file_content tool

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use gmn_protocol::JsonMap;

use crate::traits::{require_str, resolve_path};
use crate::{Tool, ToolError};

pub struct SearchFileContentTool {
    root_dir: PathBuf,
}

impl SearchFileContentTool {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn search_in_file(&self, file_path: &Path, pattern: &str, re: Option<&Regex>) -> Vec<Value> {
        let Ok(content) = std::fs::read_to_string(file_path) else {
            // Binary or unreadable files are skipped
            return Vec::new();
        };

        let rel = file_path
            .strip_prefix(&self.root_dir)
            .unwrap_or(file_path)
            .display()
            .to_string();

        let mut results = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let matched = match re {
                Some(re) => re.is_match(line),
                None => line.contains(pattern),
            };
            if matched {
                results.push(json!({
                    "file": rel,
                    "line": idx + 1,
                    "text": line,
                }));
            }
        }
        results
    }
}

#[async_trait]
impl Tool for SearchFileContentTool {
    fn name(&self) -> &str {
        "search_file_content"
    }

    fn display_name(&self) -> &str {
        "SearchText"
    }

    fn description(&self) -> &str {
        "Search for text or regex pattern in files. Returns matching lines with context."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The text or regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "The file or directory path to search in"
                },
                "regex": {
                    "type": "boolean",
                    "description": "Whether to treat pattern as regex (default: false)"
                }
            },
            "required": ["pattern", "path"]
        })
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let pattern = require_str(args, "pattern")?;
        let path = require_str(args, "path")?;
        let is_regex = args.get("regex").and_then(Value::as_bool).unwrap_or(false);

        let re = if is_regex {
            Some(
                Regex::new(pattern)
                    .map_err(|e| ToolError::InvalidArgs(format!("invalid regex: {e}")))?,
            )
        } else {
            None
        };

        let full_path = resolve_path(&self.root_dir, path);
        let metadata = std::fs::metadata(&full_path)
            .map_err(|e| ToolError::Failed(format!("path not found: {e}")))?;

        let mut matches = Vec::new();
        if metadata.is_dir() {
            for entry in WalkDir::new(&full_path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                matches.extend(self.search_in_file(entry.path(), pattern, re.as_ref()));
            }
        } else {
            matches = self.search_in_file(&full_path, pattern, re.as_ref());
        }

        let mut result = JsonMap::new();
        result.insert("pattern".to_string(), json!(pattern));
        result.insert("count".to_string(), json!(matches.len()));
        result.insert("matches".to_string(), json!(matches));
        Ok(result)
    }
}
