//! gmn - interactive chat CLI

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod args;
mod input;
mod prompt;
mod repl;
mod stats;

use args::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("GMN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match repl::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}
