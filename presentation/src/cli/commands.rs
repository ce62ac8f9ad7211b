//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for call responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One colored block per response
    #[default]
    Text,
    /// JSON array of responses
    Json,
}

/// CLI arguments for toolgate
#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(author, version, about = "Governed tool invocation - policy, confirmation and scheduling for tool calls")]
#[command(long_about = r#"
toolgate runs a batch of tool calls through a policy engine and a
confirmation channel before executing them.

Each call is checked against the policy rules:
  allow     runs immediately
  deny      is refused without asking
  ask_user  is forwarded to the confirmation prompt

The batch is a JSON array of calls:
  [{"call_id": "1", "name": "shell_exec", "args": {"command": "git status"}}]

Configuration files are loaded from (in priority order):
1. TOOLGATE_* environment variables (e.g. TOOLGATE_POLICY__DEFAULT_DECISION)
2. --config <path>     Explicit config file
3. ./toolgate.toml     Project-level config
4. ~/.config/toolgate/config.toml   Global config

Example:
  toolgate --calls calls.json
  echo '[...]' | toolgate --calls - --output json --non-interactive
"#)]
pub struct Cli {
    /// JSON file with the tool calls to run (`-` reads stdin)
    #[arg(long, value_name = "PATH|-", required_unless_present = "show_config")]
    pub calls: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Approve every confirmation request without prompting
    #[arg(long, conflicts_with = "non_interactive")]
    pub auto_approve: bool,

    /// Never prompt; calls that would need confirmation are denied
    #[arg(long)]
    pub non_interactive: bool,

    /// Give up on a confirmation after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub confirmation_timeout_ms: Option<u64>,

    /// Append audit events to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub audit_log: Option<PathBuf>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
