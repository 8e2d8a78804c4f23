// src/lib.rs

pub mod classify;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod install;
pub mod logging;
pub mod relay;
pub mod server;
pub mod types;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::cli::{AddArgs, CliArgs, Command, OutputFormat, RunArgs, ServeArgs};
use crate::config::ConfigFile;
use crate::config::loader::load_or_default;
use crate::exec::{ProcessRequest, ProcessTable, RealProcessBackend, RequestFlags};
use crate::fs::RealFileSystem;
use crate::install::AddComponentInput;
use crate::relay::{encode_record, Relay};
use crate::server::AppState;
use crate::types::OutputEvent;

/// High-level entry point used by `main.rs`.
///
/// Loads the config and dispatches to the subcommand. The returned exit
/// code reflects the classified outcome for `run` and `add`.
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let cfg = load_or_default(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("loading config from {}", path.display()),
        None => "loading config".to_string(),
    })?;
    debug!(policies = ?cfg.policies.names().collect::<Vec<_>>(), "config loaded");

    match args.command {
        Command::Serve(serve) => serve_command(cfg, serve).await,
        Command::Run(run) => run_command(&cfg, run).await,
        Command::Add(add) => add_command(&cfg, add).await,
    }
}

fn app_state(cfg: &ConfigFile) -> AppState {
    AppState::from_config(
        cfg,
        Arc::new(RealProcessBackend::new(cfg.relay.runner_options())),
        Arc::new(RealFileSystem),
    )
}

async fn serve_command(mut cfg: ConfigFile, args: ServeArgs) -> Result<ExitCode> {
    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }

    let state = app_state(&cfg);
    server::serve(state, &cfg.server).await?;
    Ok(ExitCode::SUCCESS)
}

/// Streaming mode to the terminal. Ctrl-C cancels the process.
async fn run_command(cfg: &ConfigFile, args: RunArgs) -> Result<ExitCode> {
    let (program, rest) = args
        .command
        .split_first()
        .ok_or_else(|| anyhow!("no program given"))?;
    let policy = cfg.policies.resolve(args.policy.as_deref()).ok_or_else(|| {
        anyhow!(
            "unknown classifier policy '{}'",
            args.policy.as_deref().unwrap_or_default()
        )
    })?;

    let request = ProcessRequest::new(program.clone(), rest.to_vec(), args.cwd.clone())
        .with_flags(RequestFlags {
            overwrite: args.overwrite,
            shell: args.shell,
        });

    let relay = Relay::new(
        Arc::new(RealProcessBackend::new(cfg.relay.runner_options())),
        ProcessTable::new(),
        cfg.relay.relay_options(),
    );

    let mut run = match relay.stream(request, policy).await {
        Ok(run) => run,
        Err(err) => {
            eprintln!("bones: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let cancel = run.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; cancelling run");
            cancel.cancel();
        }
    });

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    while let Some(event) = run.next().await {
        match (args.format, &event) {
            (OutputFormat::Sse, _) => {
                stdout.write_all(encode_record(&event).as_bytes()).await?;
                stdout.flush().await?;
            }
            (OutputFormat::Text, OutputEvent::Output { content }) => {
                stdout.write_all(content.as_bytes()).await?;
                stdout.flush().await?;
            }
            (OutputFormat::Text, OutputEvent::Error { content }) => {
                stderr.write_all(content.as_bytes()).await?;
                stderr.flush().await?;
            }
            (OutputFormat::Text, _) => {}
        }
    }

    Ok(report(run.outcome().await.into_result()))
}

/// Collected-mode add-component action.
async fn add_command(cfg: &ConfigFile, args: AddArgs) -> Result<ExitCode> {
    let state = app_state(cfg);
    let mut input = AddComponentInput::new(args.name).with_overwrite(args.overwrite);
    if let Some(path) = args.path {
        input = input.with_path(path);
    }

    if args.dry_run {
        return match state.installer.plan(&input) {
            Ok(request) => {
                println!("{}", request.command_line());
                println!("  cwd: {}", request.cwd().display());
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                eprintln!("bones: {err}");
                Ok(ExitCode::FAILURE)
            }
        };
    }

    match state.installer.add(input).await {
        Ok(outcome) => Ok(report(outcome.into_result())),
        Err(err) => {
            eprintln!("bones: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report(result: std::result::Result<Option<String>, classify::RunFailure>) -> ExitCode {
    match result {
        Ok(message) => {
            if let Some(message) = message.filter(|m| !m.is_empty()) {
                debug!(%message, "run succeeded");
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("bones: {failure}");
            ExitCode::FAILURE
        }
    }
}
