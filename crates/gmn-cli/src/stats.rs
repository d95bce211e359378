//! Session statistics

use colored::Colorize;
use std::time::Duration;

use gmn_protocol::TokenUsage;

// Published USD per 1M tokens (input, output)
const RATES: &[(&str, f64, f64)] = &[
    ("gemini-2.5-pro", 1.25, 10.0),
    ("gemini-2.5-flash-lite", 0.10, 0.40),
    ("gemini-2.5-flash", 0.30, 2.50),
];

/// Estimated cost in USD for a model the rate table knows about
pub fn estimated_cost(model: &str, usage: TokenUsage) -> Option<f64> {
    RATES
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map(|(_, input_rate, output_rate)| {
            (usage.input as f64 * input_rate + usage.output as f64 * output_rate) / 1_000_000.0
        })
}

pub fn print_stats(model: &str, usage: TokenUsage, elapsed: Duration) {
    let label = |s: &str| s.dimmed();
    let value = |s: String| s.blue().bold();

    eprintln!();
    eprintln!("{}", "📊 Session Stats".bold());
    eprint!(
        "   {} {}   {} {}   {} {}   {} {}",
        label("Input:"),
        value(usage.input.to_string()),
        label("Output:"),
        value(usage.output.to_string()),
        label("Total:"),
        value(usage.total().to_string()),
        label("Duration:"),
        value(format!("{}s", elapsed.as_secs())),
    );
    if let Some(cost) = estimated_cost(model, usage) {
        eprint!("   {} {}", label("Est. cost:"), value(format!("${cost:.4}")));
    }
    eprintln!();
}
