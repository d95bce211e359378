//! Name-keyed tool registry

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gmn_protocol::ToolDecl;

use crate::builtins;
use crate::Tool;

/// Lookup from tool name to capability object.
///
/// Path-resolving tools resolve relative paths against `root_dir` (the
/// process working directory at startup).
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    root_dir: PathBuf,
}

impl ToolRegistry {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_shell(root_dir, None)
    }

    /// Registry with an explicit shell override for the `shell` tool
    pub fn with_shell(root_dir: impl Into<PathBuf>, shell_path: Option<String>) -> Self {
        let root_dir = root_dir.into();
        let mut registry = Self {
            tools: HashMap::new(),
            root_dir: root_dir.clone(),
        };

        registry.register(Arc::new(builtins::read::ReadFileTool::new(&root_dir)));
        registry.register(Arc::new(builtins::write::WriteFileTool::new(&root_dir)));
        registry.register(Arc::new(builtins::list_dir::ListDirectoryTool::new(
            &root_dir,
        )));
        registry.register(Arc::new(builtins::glob::GlobTool::new(&root_dir)));
        registry.register(Arc::new(builtins::search::SearchFileContentTool::new(
            &root_dir,
        )));
        registry.register(Arc::new(builtins::edit::EditFileTool::new(&root_dir)));
        registry.register(Arc::new(builtins::web_search::WebSearchTool::new()));
        registry.register(Arc::new(builtins::web_fetch::WebFetchTool::new()));
        registry.register(Arc::new(builtins::shell::ShellTool::new(
            &root_dir, shell_path,
        )));

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations sent to the backend, sorted by name so requests are
    /// deterministic
    pub fn declarations(&self) -> Vec<ToolDecl> {
        let mut decls: Vec<ToolDecl> = self
            .tools
            .values()
            .map(|tool| ToolDecl {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        decls.sort_by(|a, b| a.name.cmp(&b.name));
        decls
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}
