//! Interactive REPL
//!
//! Reads lines from stdin, intercepts slash commands, and drives the agent
//! loop for everything else. Ctrl+C cancels an in-flight turn; at the idle
//! prompt it ends the session with exit code 130.

use colored::Colorize;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use gmn_agent::{
    AgentConfig, AgentError, AgentLoop, ConfirmationGate, EventStream, SessionStore,
    ToolCallStatus, UiEvent,
};
use gmn_backend::{CredentialsProvider, HttpClient, StoredCredentials};
use gmn_tools::ToolRegistry;

use crate::args::Cli;
use crate::input;
use crate::prompt::{line_reader, LineReader, TerminalPrompt};
use crate::stats;

enum Flow {
    Continue,
    Exit,
}

pub async fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let credentials = StoredCredentials::load()?;
    let project = credentials.project_id().unwrap_or_default();
    let backend = Arc::new(HttpClient::new(Arc::new(credentials))?);

    let cwd = std::env::current_dir()?;
    let lines = line_reader();
    let gate = ConfirmationGate::new(cli.yolo, Arc::new(TerminalPrompt::new(lines.clone())));
    let registry = ToolRegistry::with_shell(&cwd, cli.shell.clone());

    let config = AgentConfig {
        project,
        request_timeout: cli.timeout,
        ..Default::default()
    };

    let agent = AgentLoop::new(&cli.model, backend, registry, gate, config)
        .with_store(SessionStore::open_default()?);
    let (mut agent, events) = agent.with_event_stream();

    if let Some(key) = &cli.resume {
        agent.load_session_by_key(key)?;
        eprintln!(
            "{} Resumed session {}",
            "✓".green().bold(),
            agent.session_id().yellow()
        );
    }

    print_header(agent.model(), cli.yolo, &cwd);

    let printer = tokio::spawn(print_events(events));
    let started = Instant::now();
    let mut interrupted = false;

    let initial = input::prepare_input(&cli.initial_prompt(), &cli.files)?;
    if !initial.trim().is_empty() {
        echo_initial(&initial);
        submit_interruptible(&mut agent, &initial).await;
    }

    loop {
        show_prompt();

        let line = tokio::select! {
            line = read_line(&lines) => line,
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
        };

        let Some(line) = line else {
            // stdin closed
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('/') {
            match handle_command(&mut agent, &line, started) {
                Flow::Exit => break,
                Flow::Continue => continue,
            }
        }

        submit_interruptible(&mut agent, &line).await;
    }

    let model = agent.model().to_string();
    let tokens = agent.tokens();
    drop(agent);
    let _ = printer.await;

    stats::print_stats(&model, tokens, started.elapsed());
    Ok(if interrupted { 130 } else { 0 })
}

/// Run one turn; Ctrl+C cancels the turn rather than the process
async fn submit_interruptible(agent: &mut AgentLoop, text: &str) {
    let control = agent.control();
    let submit = agent.submit(text);
    tokio::pin!(submit);

    let result = loop {
        tokio::select! {
            result = &mut submit => break result,
            _ = tokio::signal::ctrl_c() => control.cancel(),
        }
    };

    // Outcome reporting happens through the event stream; only clear the
    // consumed cancel so the next turn can run
    if matches!(result, Err(AgentError::Cancelled)) {
        control.reset();
    }
}

async fn read_line(lines: &LineReader) -> Option<String> {
    lines.lock().await.next_line().await.ok().flatten()
}

fn handle_command(agent: &mut AgentLoop, line: &str, started: Instant) -> Flow {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or("").to_lowercase();
    let arg = words.collect::<Vec<_>>().join(" ");

    match command.as_str() {
        "/exit" | "/quit" | "/q" => return Flow::Exit,
        "/help" | "/h" => print_help(),
        "/clear" => {
            agent.clear_history();
            eprintln!("{}", "✓ Conversation cleared".green());
        }
        "/stats" => stats::print_stats(agent.model(), agent.tokens(), started.elapsed()),
        "/model" => {
            if arg.is_empty() {
                eprintln!("Model: {}", agent.model().yellow());
            } else {
                agent.set_model(&arg);
                eprintln!("{} Model set to {}", "✓".green().bold(), arg.yellow());
            }
        }
        "/sessions" => match agent.list_sessions() {
            Ok(sessions) if sessions.is_empty() => eprintln!("{}", "No sessions found.".dimmed()),
            Ok(sessions) => {
                for session in sessions {
                    let name = session.name.as_deref().unwrap_or("");
                    eprintln!(
                        "  {}  {:<12}  {}  {} msgs  {}",
                        session.id.yellow(),
                        name,
                        session.model.cyan(),
                        session.messages.len(),
                        session.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                    );
                }
            }
            Err(e) => eprintln!("{} {e}", "✗".red()),
        },
        "/save" => {
            if !arg.is_empty() {
                agent.set_session_name(&arg);
            }
            match agent.save_session() {
                Ok(()) => {
                    let alias = agent
                        .session_name()
                        .map(|n| format!(" as '{n}'"))
                        .unwrap_or_default();
                    eprintln!(
                        "{} Saved session {}{alias}",
                        "✓".green().bold(),
                        agent.session_id().yellow()
                    );
                }
                Err(e) => eprintln!("{} {e}", "✗".red()),
            }
        }
        "/load" => {
            if arg.is_empty() {
                eprintln!("usage: /load <id|name|last>");
            } else {
                match agent.load_session_by_key(&arg) {
                    Ok(()) => eprintln!(
                        "{} Loaded session {}",
                        "✓".green().bold(),
                        agent.session_id().yellow()
                    ),
                    Err(e) => eprintln!("{} {e}", "✗".red()),
                }
            }
        }
        "/new" => {
            agent.start_new_session();
            eprintln!(
                "{} Started new session {}",
                "✓".green().bold(),
                agent.session_id().yellow()
            );
        }
        _ => eprintln!("unknown command: {command} (try /help)"),
    }

    Flow::Continue
}

async fn print_events(mut events: EventStream) {
    while let Some(event) = events.recv().await {
        match event {
            UiEvent::UserTurnAdded { .. } => {}
            UiEvent::ModelTextChunk { text } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            UiEvent::ToolCallStarted { name, summary } => {
                let header = "⚡ TOOL".magenta().bold();
                let name = name.yellow().bold();
                if summary.is_empty() {
                    eprintln!("\n{header} {name}");
                } else {
                    eprintln!("\n{header} {name} {}", format!("→ {summary}").dimmed());
                }
            }
            UiEvent::ToolCallFinished { name, status, info } => match status {
                ToolCallStatus::Success => {
                    eprintln!("   {} {} {}", "✓".green().bold(), name, info.dimmed())
                }
                ToolCallStatus::Error | ToolCallStatus::Cancelled => {
                    eprintln!("   {} {}", "✗".red().bold(), info.dimmed())
                }
            },
            UiEvent::Done { .. } => println!(),
            UiEvent::Error { message } => eprintln!("\n{} {message}", "✗".red().bold()),
            UiEvent::Cancelled => eprintln!("\n{}", "✗ cancelled".red()),
        }
    }
}

fn print_header(model: &str, yolo: bool, cwd: &Path) {
    eprintln!();
    eprint!("{}  {}", "✨ gmn".magenta().bold(), model.black().on_magenta());
    if yolo {
        eprint!("  {}", " YOLO ".white().on_red().bold());
    }
    eprintln!();
    eprintln!("{}", format!("📁 {}", cwd.display()).dimmed());
    eprintln!(
        "{}",
        "Type /help for commands, /exit to quit".dimmed()
    );
    eprintln!();
}

fn print_help() {
    let cmd = |s: &str| s.magenta().bold();
    eprintln!();
    eprintln!("{}", "Available Commands:".blue().bold());
    eprintln!("  {}  Show this help", cmd("/help, /h      "));
    eprintln!("  {}  Exit the chat", cmd("/exit, /q      "));
    eprintln!("  {}  Clear conversation history", cmd("/clear         "));
    eprintln!("  {}  Show token usage stats", cmd("/stats         "));
    eprintln!("  {}  Show or switch the model", cmd("/model [id]    "));
    eprintln!("  {}  List saved sessions", cmd("/sessions      "));
    eprintln!("  {}  Save session (optionally named)", cmd("/save [name]   "));
    eprintln!("  {}  Load a session by id or name", cmd("/load <id|name>"));
    eprintln!("  {}  Start a fresh session", cmd("/new           "));
    eprintln!();
}

fn show_prompt() {
    eprint!("{} ", "❯".green().bold());
}

fn echo_initial(input: &str) {
    let first_line = input.lines().next().unwrap_or("");
    eprintln!("{}", format!("❯ {first_line}").blue());
    if input.lines().count() > 1 {
        eprintln!("{}", "  (+ file contents)".dimmed());
    }
    eprintln!();
}
