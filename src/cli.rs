// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `bones`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bones",
    version,
    about = "Run external commands and relay their output as it is produced.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Bones.toml` in the current working directory when present,
    /// otherwise built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BONES_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve the streaming endpoint and the component actions over HTTP.
    Serve(ServeArgs),

    /// Run one command and relay its output to this terminal.
    Run(RunArgs),

    /// Add a UI component through the configured installer.
    Add(AddArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Override `[server].host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Override `[server].port`.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Working directory for the process.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub cwd: PathBuf,

    /// Run through the platform shell (`sh -c` / `cmd /C`).
    #[arg(long)]
    pub shell: bool,

    /// Classifier policy name from the config.
    #[arg(long, value_name = "NAME")]
    pub policy: Option<String>,

    /// Treat the policy's overwrite sentinel exit code as success.
    #[arg(long)]
    pub overwrite: bool,

    /// How events are written to the terminal.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Program followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    /// Component name, e.g. `button`.
    pub name: String,

    /// Target directory passed through to the installer.
    #[arg(long, value_name = "DIR")]
    pub path: Option<String>,

    /// Replace an existing component.
    #[arg(long)]
    pub overwrite: bool,

    /// Run the preflight checks and print the command without running it.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// stdout chunks to stdout, stderr chunks to stderr.
    Text,
    /// One `data: <json>` record per event on stdout.
    Sse,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
