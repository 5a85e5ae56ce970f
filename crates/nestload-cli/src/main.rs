//! Nestload command-line launcher
//!
//! Runs, inspects and queries containers whose dependencies are archives
//! nested inside them. Logs go to stderr; the hosted program owns stdout.

mod commands;
mod output;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use nestload_runtime::{EntryPointRegistry, LauncherConfig, Launcher, LayoutKind, RuntimeError};
use tracing_subscriber::EnvFilter;

use crate::output::{resolve_color_choice, StyledOutput};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "NESTLOAD_LOG";

#[derive(Parser, Debug)]
#[command(name = "nestload")]
#[command(about = "Launch applications packaged with nested dependency archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Launcher configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Container layout, overriding the configuration file
    #[arg(long, value_enum, global = true)]
    layout: Option<LayoutArg>,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the container's entry point
    Run {
        /// Container archive or exploded directory
        container: PathBuf,
        /// Entry-point symbol, overriding the manifest
        #[arg(long)]
        main: Option<String>,
        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List container entries with their classification
    List {
        /// Container archive or exploded directory
        container: PathBuf,
    },

    /// Show the ordered code-source list
    Sources {
        /// Container archive or exploded directory
        container: PathBuf,
    },

    /// Resolve a symbol and show which source defines it
    Resolve {
        /// Container archive or exploded directory
        container: PathBuf,
        /// Fully-qualified symbol, e.g. com.example.Main
        symbol: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Jar,
    War,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn execute(cli: Cli) -> anyhow::Result<i32> {
    let mut config = load_config(cli.config.as_deref(), cli.layout)?;
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    match cli.command {
        Commands::Run {
            container,
            main,
            args,
        } => {
            if main.is_some() {
                config.main = main;
            }
            commands::run::execute(&container, config, args)
        }
        Commands::List { container } => {
            let launcher = inspector(config)?;
            commands::list::execute(&container, launcher.classifier(), &mut out)
        }
        Commands::Sources { container } => {
            commands::sources::execute(&container, &inspector(config)?, &mut out)
        }
        Commands::Resolve { container, symbol } => {
            commands::resolve::execute(&container, &symbol, &inspector(config)?, &mut out)
        }
    }
}

/// Launcher for commands that never invoke an entry point.
fn inspector(config: LauncherConfig) -> Result<Launcher, RuntimeError> {
    Launcher::new(config, EntryPointRegistry::new())
}

fn load_config(path: Option<&Path>, layout: Option<LayoutArg>) -> Result<LauncherConfig, RuntimeError> {
    let mut config = match path {
        Some(path) => LauncherConfig::from_file(path)?,
        None => LauncherConfig::default(),
    };
    if let Some(layout) = layout {
        config.layout = match layout {
            LayoutArg::Jar => LayoutKind::Jar,
            LayoutArg::War => LayoutKind::War,
        };
        config.custom_layout = None;
    }
    Ok(config)
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RuntimeError>())
        .map(RuntimeError::exit_code)
        .unwrap_or(1)
}
