#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use ganttsync_core::config::resolve_config;
use ganttsync_core::error::ErrorCode;
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "gsync: live-edit client for Gantt task tables",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Backend base URL (overrides config and GANTTSYNC_ENDPOINT).
    #[arg(long, global = true, value_name = "URL")]
    endpoint: Option<String>,

    /// Read configuration from this file on top of the project and user files.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Tasks",
        about = "Load the task table and print it",
        long_about = "Fetch the task table from the data endpoint (or a local JSON file) and print it as an outline.",
        after_help = "EXAMPLES:\n    # Print the backend's tasks\n    gsync load\n\n    # Read a saved table and emit JSON\n    gsync load --table tasks.json --json"
    )]
    Load(cmd::load::LoadArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Edit tasks interactively",
        long_about = "Start a line-oriented editing session. Every change is sent to the edit endpoint as soon as it is made.",
        after_help = "EXAMPLES:\n    # Edit the backend's tasks\n    gsync shell\n\n    # Try a script without touching the backend\n    gsync shell --table tasks.json --dry-run < edits.txt"
    )]
    Shell(cmd::shell::ShellArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    gsync completions bash\n\n    # Generate zsh completions\n    gsync completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GANTTSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "ganttsync=debug,info"
        } else {
            "ganttsync=info,warn"
        })
    });

    let format = env::var("GANTTSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let config = match resolve_config(
        &project_root,
        cli.config.as_deref(),
        cli.endpoint.as_deref(),
        cli.json,
    ) {
        Ok(config) => config,
        Err(err) => {
            let mode = if cli.json { OutputMode::Json } else { OutputMode::Text };
            output::render_error(
                mode,
                &CliError::with_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);

    match cli.command {
        Commands::Load(ref args) => cmd::load::run_load(args, &config, output),
        Commands::Shell(ref args) => cmd::shell::run_shell(args, &config, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
