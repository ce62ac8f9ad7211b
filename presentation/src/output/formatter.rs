//! Output formatters for call responses

use colored::Colorize;
use toolgate_domain::{ResponseStatus, ToolCallResponse, truncate};

/// Maximum bytes of tool output shown per response in text mode
const MAX_TEXT_OUTPUT: usize = 4000;

/// Trait for formatting a batch of responses
pub trait OutputFormatter {
    fn format(&self, responses: &[ToolCallResponse]) -> String;
}

/// Colored, human-readable output
pub struct ConsoleFormatter;

/// Pretty-printed JSON array of responses
pub struct JsonFormatter;

impl ConsoleFormatter {
    fn format_response(response: &ToolCallResponse) -> String {
        let mut out = String::new();
        let duration = response
            .duration_ms
            .map(|ms| format!(" ({}ms)", ms))
            .unwrap_or_default();

        let header = format!("{} {}{}", response.call_id, response.tool_name, duration);
        match (response.status(), &response.error) {
            (ResponseStatus::Success, _) | (_, None) => {
                out.push_str(&format!("{} {}\n", "✓".green().bold(), header.bold()));
                if let Some(display) = &response.display_result {
                    out.push_str(&format!("  {}\n", display.dimmed()));
                }
                let text = response.text();
                if !text.is_empty() {
                    for line in truncate(&text, MAX_TEXT_OUTPUT).lines() {
                        out.push_str(&format!("  │ {}\n", line));
                    }
                }
            }
            (ResponseStatus::Rejected, Some(error)) => {
                out.push_str(&format!("{} {}\n", "⊘".yellow().bold(), header.bold()));
                out.push_str(&format!(
                    "  {} {}\n",
                    format!("[{}]", error.kind).yellow(),
                    error.message
                ));
            }
            (ResponseStatus::Error, Some(error)) => {
                out.push_str(&format!("{} {}\n", "✗".red().bold(), header.bold()));
                out.push_str(&format!(
                    "  {} {}\n",
                    format!("[{}]", error.kind).red(),
                    error.message
                ));
            }
        }
        out
    }

    fn summary(responses: &[ToolCallResponse]) -> String {
        let count = |status: ResponseStatus| {
            responses
                .iter()
                .filter(|r| r.status() == status)
                .count()
        };
        format!(
            "{} calls: {} succeeded, {} rejected, {} failed",
            responses.len(),
            count(ResponseStatus::Success).to_string().green(),
            count(ResponseStatus::Rejected).to_string().yellow(),
            count(ResponseStatus::Error).to_string().red()
        )
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, responses: &[ToolCallResponse]) -> String {
        let mut output = String::new();
        for response in responses {
            output.push_str(&Self::format_response(response));
            output.push('\n');
        }
        output.push_str(&Self::summary(responses));
        output
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, responses: &[ToolCallResponse]) -> String {
        serde_json::to_string_pretty(responses).unwrap_or_else(|_| "[]".to_string())
    }
}
