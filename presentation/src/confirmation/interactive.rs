//! Interactive terminal confirmation.
//!
//! When the policy engine answers `ask_user`, the user sees:
//!
//! ```text
//! ═══════════════════════════════════════════════════════════════
//!   ⚠️  Tool Call Requires Confirmation
//! ═══════════════════════════════════════════════════════════════
//!
//! Tool:    shell_exec (aliases: ShellTool, run_shell_command)
//! Call:    call-1
//! Args:
//!   {
//!     "command": "git push"
//!   }
//!
//! Commands:
//!   y  - Run this call
//!   n  - Refuse this call
//!   e  - Run with edited arguments (JSON)
//!
//! confirm>
//! ```
//!
//! | Command | Aliases | Description |
//! |---------|---------|-------------|
//! | `y` | `yes`, `/approve` | Run the call as requested |
//! | `n` | `no`, `/reject` | Refuse the call |
//! | `e` | `edit`, `/edit` | Enter replacement arguments, then run |

use async_trait::async_trait;
use colored::Colorize;
use serde_json::Value;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use toolgate_application::{ConfirmationError, ConfirmationHandler, ConfirmationOutcome};
use toolgate_domain::ConfirmationRequest;
use tracing::debug;

type Input = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

/// Parsed prompt command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Approve,
    Reject,
    Edit,
}

fn parse_command(input: &str) -> Option<Command> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" | "/approve" => Some(Command::Approve),
        "n" | "no" | "/reject" => Some(Command::Reject),
        "e" | "edit" | "/edit" => Some(Command::Edit),
        _ => None,
    }
}

/// Terminal y/n prompt for confirmation requests.
///
/// Requests arrive concurrently from the scheduler; prompts are shown one
/// at a time so their output never interleaves. A prompt whose call stops
/// waiting is withdrawn and the next one takes over the input.
pub struct InteractiveConfirmation {
    input: Mutex<Input>,
}

impl InteractiveConfirmation {
    /// Prompt on stdin.
    pub fn new() -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()))
    }

    /// Prompt reading answers from `reader`.
    pub fn with_input(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(reader);
        Self {
            input: Mutex::new(reader.lines()),
        }
    }

    fn display_request(request: &ConfirmationRequest) {
        println!();
        println!("{}", render_request(request));
    }

    async fn read_line(
        input: &mut Input,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ConfirmationError> {
        print!("{} ", prompt.magenta().bold());
        io::stdout()
            .flush()
            .map_err(|e| ConfirmationError::IoError(format!("Failed to flush stdout: {}", e)))?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                println!();
                println!("{}", "Confirmation withdrawn.".dimmed());
                Err(ConfirmationError::Cancelled)
            }
            line = input.next_line() => match line {
                Ok(Some(line)) => Ok(line.trim().to_string()),
                // stdin closed; nobody left to answer
                Ok(None) => Err(ConfirmationError::Cancelled),
                Err(e) => Err(ConfirmationError::IoError(format!("Failed to read input: {}", e))),
            },
        }
    }

    async fn read_args(
        input: &mut Input,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ConfirmationError> {
        let line = Self::read_line(input, "args>", cancel).await?;
        if line.is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&line) {
            Ok(args) => Ok(Some(args)),
            Err(e) => {
                println!("{} {}", "Invalid JSON:".red(), e);
                Ok(None)
            }
        }
    }
}

impl Default for InteractiveConfirmation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfirmationHandler for InteractiveConfirmation {
    async fn confirm(
        &self,
        request: &ConfirmationRequest,
        cancel: CancellationToken,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        let mut input = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConfirmationError::Cancelled),
            input = self.input.lock() => input,
        };
        debug!("Prompting for confirmation {}", request.correlation_id);
        Self::display_request(request);

        loop {
            let line = Self::read_line(&mut input, "confirm>", &cancel).await?;

            match parse_command(&line) {
                Some(Command::Approve) => {
                    println!("{}", "Approved.".green());
                    return Ok(ConfirmationOutcome::Approve);
                }
                Some(Command::Reject) => {
                    println!("{}", "Rejected.".red());
                    return Ok(ConfirmationOutcome::Reject);
                }
                Some(Command::Edit) => {
                    println!("Enter replacement arguments as one line of JSON (empty to go back):");
                    if let Some(args) = Self::read_args(&mut input, &cancel).await? {
                        println!("{}", "Approved with edited arguments.".green());
                        return Ok(ConfirmationOutcome::ApproveWithArgs(args));
                    }
                }
                None => {
                    println!(
                        "{} Unknown command '{}'. Use y, n or e.",
                        "?".yellow(),
                        line
                    );
                }
            }
        }
    }
}

/// Render the confirmation prompt block.
fn render_request(request: &ConfirmationRequest) -> String {
    let rule = "═══════════════════════════════════════════════════════════════";
    let call = &request.tool_call;

    let mut out = String::new();
    out.push_str(&format!("{}\n", rule.yellow().bold()));
    out.push_str(&format!(
        "{}\n",
        "  ⚠️  Tool Call Requires Confirmation".yellow().bold()
    ));
    out.push_str(&format!("{}\n\n", rule.yellow().bold()));

    let tool = if call.aliases.is_empty() {
        call.name.clone()
    } else {
        format!("{} (aliases: {})", call.name, call.aliases.join(", "))
    };
    out.push_str(&format!("{}    {}\n", "Tool:".cyan().bold(), tool));
    out.push_str(&format!("{}    {}\n", "Call:".cyan().bold(), request.call_id));
    out.push_str(&format!("{}\n", "Args:".cyan().bold()));
    let args = serde_json::to_string_pretty(&call.args).unwrap_or_else(|_| call.args.to_string());
    for line in args.lines() {
        out.push_str(&format!("  {}\n", line));
    }
    out.push('\n');

    out.push_str(&format!("{}\n", "Commands:".cyan().bold()));
    out.push_str(&format!("  {}  - Run this call\n", "y".green()));
    out.push_str(&format!("  {}  - Refuse this call\n", "n".red()));
    out.push_str(&format!(
        "  {}  - Run with edited arguments (JSON)\n",
        "e".yellow()
    ));
    out
}
