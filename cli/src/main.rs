//! CLI entrypoint for toolgate
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolgate_application::{
    AuditTrail, AutoApproveConfirmation, AutoRejectConfirmation, ConfirmationChannel,
    ConfirmationHandler, MessageBus, ToolCallScheduler,
};
use toolgate_domain::{CallId, ToolCallRequest, ToolCallResponse};
use toolgate_infrastructure::{ConfigLoader, FileConfig, JsonlAuditLogger, default_registry};
use toolgate_presentation::{
    Cli, ConsoleFormatter, InteractiveConfirmation, JsonFormatter, OutputFormat, OutputFormatter,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let result = runtime.block_on(run(cli));
    // A withdrawn prompt may still be blocked reading stdin
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<ExitCode> {
    info!("Starting toolgate");

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    // === Configuration ===
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    apply_cli_overrides(&mut config, &cli);

    let issues = config.validate();
    if !issues.is_empty() {
        for issue in &issues {
            eprintln!("config error: {}", issue);
        }
        bail!("Invalid configuration ({} issue(s))", issues.len());
    }

    let calls_path = cli
        .calls
        .as_deref()
        .context("--calls is required")?;
    let requests = read_calls(calls_path)?;

    // === Dependency Injection ===
    let policy = config.policy.to_policy_engine()?;
    let bus = Arc::new(MessageBus::new(Arc::new(policy)));

    let working_dir = match &config.tools.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine working directory")?,
    };
    let registry = default_registry(
        working_dir,
        Duration::from_secs(config.tools.shell_timeout_secs),
    )?;
    let scheduler = ToolCallScheduler::new(Arc::new(registry), Arc::clone(&bus))
        .with_config(config.scheduler.to_scheduler_config());

    let handler: Arc<dyn ConfirmationHandler> = if cli.auto_approve {
        Arc::new(AutoApproveConfirmation)
    } else if config.policy.non_interactive {
        Arc::new(AutoRejectConfirmation)
    } else {
        if calls_path == "-" {
            warn!("Tool calls were read from stdin; confirmation prompts cannot be answered");
        }
        Arc::new(InteractiveConfirmation::new())
    };
    let _channel = ConfirmationChannel::attach(Arc::clone(&bus), handler);

    let _audit = config.logging.audit_log.as_ref().and_then(|path| {
        match JsonlAuditLogger::new(path) {
            Some(logger) => Some(AuditTrail::attach(Arc::clone(&bus), Arc::new(logger))),
            None => {
                warn!("Audit log disabled: could not open {}", path.display());
                None
            }
        }
    });

    // === Run the batch ===
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling pending tool calls");
                cancel.cancel();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted again; exiting");
                std::process::exit(130);
            }
        });
    }

    let order = request_order(&requests);
    let mut responses = scheduler.execute_batch(requests, &cancel).await;
    responses.sort_by_key(|r| order.get(&r.call_id).copied().unwrap_or(usize::MAX));

    let formatter: Box<dyn OutputFormatter> = match cli.output {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    };
    println!("{}", formatter.format(&responses));

    Ok(exit_code(&responses))
}

/// Initialize logging based on verbosity level.
///
/// The returned guard must stay alive for file output to be flushed.
fn init_tracing(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let Some(path) = &cli.log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("--log-file must name a file: {}", path.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

fn apply_cli_overrides(config: &mut FileConfig, cli: &Cli) {
    if cli.non_interactive {
        config.policy.non_interactive = true;
    }
    if let Some(ms) = cli.confirmation_timeout_ms {
        config.scheduler.confirmation_timeout_ms = Some(ms);
    }
    if let Some(path) = &cli.audit_log {
        config.logging.audit_log = Some(path.clone());
    }
}

/// Read a JSON array of tool calls from a file, or stdin for `-`.
fn read_calls(source: &str) -> Result<Vec<ToolCallRequest>> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read tool calls from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read tool calls from {}", source))?
    };

    serde_json::from_str(&raw).context("Tool calls must be a JSON array of {call_id, name, args}")
}

/// Position of each call id in the submitted batch.
fn request_order(requests: &[ToolCallRequest]) -> HashMap<CallId, usize> {
    let mut order = HashMap::new();
    for (i, request) in requests.iter().enumerate() {
        order.entry(request.call_id.clone()).or_insert(i);
    }
    order
}

fn exit_code(responses: &[ToolCallResponse]) -> ExitCode {
    if responses.iter().all(ToolCallResponse::is_success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
