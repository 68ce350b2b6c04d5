//! CLI entrypoint for planwire
//!
//! Wires the layers together: loads configuration, starts the session
//! manager, builds the execution router and runs the planning loop.

mod console;

use anyhow::{Result, bail};
use clap::Parser;
use console::ConsoleObserver;
use planwire_application::ports::{CompositeRunObserver, ToolExecutorPort};
use planwire_application::use_cases::RunPlanUseCase;
use planwire_infrastructure::config::ConfigLoader;
use planwire_infrastructure::logging::JsonlRunLogger;
use planwire_infrastructure::model::CommandModelClient;
use planwire_infrastructure::remote::SessionManager;
use planwire_infrastructure::tools::{ExecutionRouter, format_catalog};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "planwire", about = "LLM-driven tool-call planning engine")]
struct Cli {
    /// The task to plan and execute
    task: Option<String>,

    /// Explicit config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ignore config files and run with built-in defaults
    #[arg(long, conflicts_with = "config")]
    no_config: bool,

    /// List every registered tool and exit
    #[arg(long)]
    list_tools: bool,

    /// Append the JSONL run log to this file (overrides config)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Suppress per-iteration console output
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e))?
    };

    // === Dependency Injection ===
    let manager = Arc::new(SessionManager::new(config.session.call_timeout()));
    let router = if config.servers.is_empty() {
        ExecutionRouter::new()
    } else {
        let starter = Arc::clone(&manager);
        let servers = config.servers.clone();
        tokio::task::spawn_blocking(move || starter.start(&servers)).await??;
        info!(servers = config.servers.len(), "remote sessions started");
        ExecutionRouter::new().with_sessions(Arc::clone(&manager))
    };

    if cli.list_tools {
        println!("{}", format_catalog(&router.registry().catalog()));
        shutdown(&manager, config.session.stop_grace()).await;
        return Ok(());
    }

    let Some(task) = cli.task else {
        shutdown(&manager, config.session.stop_grace()).await;
        bail!("a task is required (or use --list-tools)");
    };
    let Some(model_command) = config.model.command.clone() else {
        shutdown(&manager, config.session.stop_grace()).await;
        bail!("no model configured; set [model] command in planwire.toml");
    };

    let model = Arc::new(CommandModelClient::new(
        model_command,
        config.model.args.clone(),
    ));
    let use_case = RunPlanUseCase::new(model, Arc::new(router))
        .with_config(config.run.to_run_config());

    let mut observer = CompositeRunObserver::new();
    if !cli.quiet {
        observer = observer.with(Box::new(ConsoleObserver::new(cli.verbose > 0)));
    }
    let run_log = cli.log_file.clone().or(config.log.run_log.clone());
    if let Some(path) = run_log
        && let Some(logger) = JsonlRunLogger::new(&path)
    {
        observer = observer.with(Box::new(logger));
    }

    let result = use_case.execute(&task, &observer).await;

    shutdown(&manager, config.session.stop_grace()).await;

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn shutdown(manager: &Arc<SessionManager>, grace: Duration) {
    if !manager.is_running() {
        return;
    }
    let manager = Arc::clone(manager);
    let _ = tokio::task::spawn_blocking(move || manager.stop(grace)).await;
}
