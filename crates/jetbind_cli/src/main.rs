//! jetbind CLI
//!
//! Command-line tools for working with the jetbind engine binding.
//!
//! # Commands
//!
//! - `explain` - Classify status codes and describe them
//! - `codes` - List every named warning and error
//! - `config` - Validate an instance configuration file
//! - `selftest` - Run a scripted workload and check handle hygiene

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::OutputFormat;
use crate::error::CliResult;

/// jetbind command-line tools.
#[derive(Parser)]
#[command(name = "jetbind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify status codes (numbers or names) and describe them
    Explain {
        /// Codes to explain, e.g. -1605, 1004 or KeyDuplicate
        #[arg(required = true, allow_negative_numbers = true)]
        codes: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List every named warning and error
    Codes {
        /// Only list warnings
        #[arg(short, long, conflicts_with = "errors")]
        warnings: bool,

        /// Only list errors
        #[arg(short, long)]
        errors: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate an instance configuration file and show its parameters
    Config {
        /// JSON configuration file
        file: PathBuf,

        /// Also apply the configuration to a simulated instance and read
        /// every parameter back
        #[arg(short, long)]
        apply: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a scripted workload and check that every handle is released
    Selftest {
        /// Number of records to insert
        #[arg(short, long, default_value = "100")]
        records: usize,

        /// Run against a native engine library instead of the simulator
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Explain { codes, format } => {
            commands::explain::run(&codes, format.parse::<OutputFormat>()?)
        }
        Commands::Codes {
            warnings,
            errors,
            format,
        } => {
            let show_all = !warnings && !errors;
            commands::codes::run(
                warnings || show_all,
                errors || show_all,
                format.parse::<OutputFormat>()?,
            )
        }
        Commands::Config {
            file,
            apply,
            format,
        } => commands::config::run(&file, apply, format.parse::<OutputFormat>()?),
        Commands::Selftest {
            records,
            library,
            format,
        } => commands::selftest::run(records, library.as_deref(), format.parse::<OutputFormat>()?),
        Commands::Version => {
            println!("jetbind CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("jetbind core v{}", jetbind_core::VERSION);
            Ok(())
        }
    }
}
