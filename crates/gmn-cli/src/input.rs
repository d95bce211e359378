//! Initial prompt assembly
//!
//! The first user message is piped stdin, then `--file` contents (each
//! under a `=== path ===` header), then the prompt text, joined by blank
//! lines.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

pub fn prepare_input(prompt: &str, files: &[PathBuf]) -> std::io::Result<String> {
    let mut parts = Vec::new();

    let stdin = read_piped_stdin()?;
    if !stdin.is_empty() {
        parts.push(stdin);
    }

    let file_content = read_files(files)?;
    if !file_content.is_empty() {
        parts.push(file_content);
    }

    if !prompt.is_empty() {
        parts.push(prompt.to_string());
    }

    Ok(parts.join("\n\n"))
}

fn read_piped_stdin() -> std::io::Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut data = String::new();
    stdin.lock().read_to_string(&mut data)?;
    Ok(data)
}

fn read_files(paths: &[PathBuf]) -> std::io::Result<String> {
    let mut out = String::new();
    for path in paths {
        let content = std::fs::read_to_string(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to read file {}: {e}", path.display()),
            )
        })?;
        out.push_str(&format!("=== {} ===\n", path.display()));
        out.push_str(&content);
        out.push_str("\n\n");
    }
    Ok(out)
}
