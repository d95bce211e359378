//! Command-line flags

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "gmn",
    version,
    about = "Interactive chat session with a generative-language backend",
    long_about = "Starts an interactive chat session. The model can request local tools\n(read/edit files, search, fetch URLs, run shell commands); destructive\ntools ask for confirmation unless --yolo is set."
)]
pub struct Cli {
    /// Initial prompt (alternative to --prompt)
    pub initial: Vec<String>,

    /// Model to use
    #[arg(short, long, default_value = "gemini-2.5-flash")]
    pub model: String,

    /// Initial prompt
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Files to include in context (repeatable)
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Resume a saved session by id, name, or "last"
    #[arg(short, long)]
    pub resume: Option<String>,

    /// Skip all confirmation prompts (dangerous!)
    #[arg(long)]
    pub yolo: bool,

    /// Shell to use for commands (default: auto-detect)
    #[arg(long)]
    pub shell: Option<String>,

    /// Per-request API timeout (e.g. 90s, 5m)
    #[arg(short, long, default_value = "5m", value_parser = parse_duration)]
    pub timeout: Duration,
}

impl Cli {
    /// The -p flag wins; positional words join into one prompt otherwise
    pub fn initial_prompt(&self) -> String {
        match &self.prompt {
            Some(p) => p.clone(),
            None => self.initial.join(" "),
        }
    }
}

/// Parse `90`, `90s`, `5m`, or `1h` into a duration
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (number, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {s}"))?;

    match unit {
        "s" | "" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(format!("invalid duration unit: {unit}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn prompt_flag_wins_over_positional() {
        let cli = Cli::parse_from(["gmn", "hello", "world", "-p", "explicit"]);
        assert_eq!(cli.initial_prompt(), "explicit");

        let cli = Cli::parse_from(["gmn", "hello", "world"]);
        assert_eq!(cli.initial_prompt(), "hello world");
    }

    #[test]
    fn defaults_are_sensible() {
        let cli = Cli::parse_from(["gmn"]);
        assert_eq!(cli.model, "gemini-2.5-flash");
        assert_eq!(cli.timeout, Duration::from_secs(300));
        assert!(!cli.yolo);
        assert!(cli.resume.is_none());
    }
}
