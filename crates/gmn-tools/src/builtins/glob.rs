//! glob tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

use gmn_protocol::JsonMap;

use crate::traits::require_str;
use crate::{Tool, ToolError};

pub struct GlobTool {
    root_dir: PathBuf,
}

impl GlobTool {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn display_name(&self) -> &str {
        "FindFiles"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. Supports wildcards like *, **, and ?."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The glob pattern to match (e.g., '**/*.rs', 'src/*.toml')"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: &JsonMap) -> Result<JsonMap, ToolError> {
        let pattern = require_str(args, "pattern")?;

        let full_pattern = if std::path::Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            self.root_dir.join(pattern).display().to_string()
        };

        let entries = glob::glob(&full_pattern)
            .map_err(|e| ToolError::InvalidArgs(format!("invalid pattern: {e}")))?;

        let mut matches: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .map(|path| {
                path.strip_prefix(&self.root_dir)
                    .map(|rel| rel.display().to_string())
                    .unwrap_or_else(|_| path.display().to_string())
            })
            .collect();
        matches.sort();

        let mut result = JsonMap::new();
        result.insert("pattern".to_string(), json!(pattern));
        result.insert("count".to_string(), json!(matches.len()));
        result.insert("matches".to_string(), json!(matches));
        Ok(result)
    }
}
