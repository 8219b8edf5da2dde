//! # modcfg CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use modcfg_engine::{EnginePaths, ProcessEnvironment};
use tracing_subscriber::EnvFilter;

use modcfg_cli::commands::{run_save, run_schema, run_show, run_status, run_validate};
use modcfg_cli::settings::Host;

/// Inspect and edit the modcfg host settings.
#[derive(Parser, Debug)]
#[command(name = "modcfg", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Data directory. Defaults to MODCFG_DATA_DIR, then ./data.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the JSON schema of the host settings.
    Schema,

    /// Validate a settings document without saving it.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the effective settings, environment overrides applied.
    Show,

    /// Save a settings document.
    Save {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the storage path, environment overrides and restart state.
    Status,
}

fn main() -> ExitCode {
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
        .with_writer(io::stderr)
        .init();

    let paths = match cli.data_dir {
        Some(dir) => EnginePaths::new(dir),
        None => EnginePaths::from_env(),
    };
    tracing::debug!(data_dir = %paths.data_dir.display(), "resolved data directory");

    let result = Host::open(paths, ProcessEnvironment).and_then(|host| {
        let mut out = io::stdout().lock();
        match &cli.command {
            Commands::Schema => run_schema(&host, &mut out),
            Commands::Validate { file } => run_validate(&host, file, &mut out),
            Commands::Show => run_show(&host, &mut out),
            Commands::Save { file } => run_save(&host, file, &mut out),
            Commands::Status => run_status(&host, &mut out),
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
