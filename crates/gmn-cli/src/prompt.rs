//! Terminal confirmation prompt
//!
//! Plain line-oriented prompt: request details (with a unified diff for
//! edits), then a `[Y]es / [n]o / [a]lways` answer read from the shared
//! stdin line reader.

use async_trait::async_trait;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use gmn_agent::{ConfirmationPrompt, ConfirmationRequest, Outcome};
use gmn_tools::ConfirmationCategory;

/// Stdin line source shared between the REPL and the confirmation prompt,
/// so buffered read-ahead never swallows the other side's input
pub type LineReader = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub fn line_reader() -> LineReader {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

pub struct TerminalPrompt {
    lines: LineReader,
}

impl TerminalPrompt {
    pub fn new(lines: LineReader) -> Self {
        Self { lines }
    }

    fn print_request(request: &ConfirmationRequest) {
        eprintln!();
        eprintln!("{} {}", "🔒".yellow(), request.title.bold());
        eprintln!("   {} {}", "Tool:".dimmed(), request.tool_name);

        if let Some(path) = &request.file_path {
            eprintln!("   {} {}", "File:".dimmed(), path);
        }
        if let Some(url) = &request.url {
            eprintln!("   {} {}", "URL:".dimmed(), url);
        }
        if let Some(command) = &request.command {
            eprintln!("   {} {}", "Command:".dimmed(), command);
        }

        match request.category {
            ConfirmationCategory::Edit => {
                let original = request.original_content.as_deref().unwrap_or("");
                let new = request.new_content.as_deref().unwrap_or("");
                eprintln!("   {}", "─── Changes ───".dimmed());
                for line in render_diff(original, new).lines() {
                    let styled = match line.trim_start_matches(|c: char| c.is_ascii_digit() || c == ' ').chars().next() {
                        Some('+') => line.green().to_string(),
                        Some('-') => line.red().to_string(),
                        _ => line.dimmed().to_string(),
                    };
                    eprintln!("   {styled}");
                }
            }
            ConfirmationCategory::Mcp => {
                let blob = serde_json::to_string_pretty(&request.args).unwrap_or_default();
                for line in blob.lines() {
                    eprintln!("   {}", line.dimmed());
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl ConfirmationPrompt for TerminalPrompt {
    async fn confirm(&self, request: &ConfirmationRequest) -> Outcome {
        Self::print_request(request);
        eprint!("\nProceed? [Y]es / [n]o / [a]lways: ");

        let answer = match self.lines.lock().await.next_line().await {
            Ok(Some(line)) => line.trim().to_lowercase(),
            // EOF or a broken terminal cancels
            _ => return Outcome::Cancel,
        };

        match answer.as_str() {
            "y" | "yes" | "" => Outcome::ProceedOnce,
            "a" | "always" => Outcome::ProceedAlways,
            _ => Outcome::Cancel,
        }
    }
}

/// Unified line diff: additions `+`, deletions `-`, unchanged two spaces,
/// numbered on the destination side
pub fn render_diff(original: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(original, new);
    let mut out = String::new();
    let mut line_num = 1usize;

    for change in diff.iter_all_changes() {
        let text = change.value().trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Insert => {
                out.push_str(&format!("{line_num:>4} + {text}\n"));
                line_num += 1;
            }
            ChangeTag::Delete => {
                out.push_str(&format!("{line_num:>4} - {text}\n"));
            }
            ChangeTag::Equal => {
                out.push_str(&format!("{line_num:>4}   {text}\n"));
                line_num += 1;
            }
        }
    }

    out
}
