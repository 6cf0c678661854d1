//! `peek`: inspect how the `po!` / `pv!` / `pe!` debug primitives see source code.
//!
//! # Usage
//!
//! ```bash
//! # What would pv! print as the name for the call on line 12?
//! peek extract src/main.rs --line 12
//!
//! # Resolve index sub-expressions against ad hoc locals
//! peek resolve "m[i][j]" --local i=0 --local j=1
//!
//! # Find leftover debug prints
//! peek scan src/
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::WrapErr;
use peek_cli::commands::{
    self, eval::EvalArgs, extract::ExtractArgs, resolve::ResolveArgs, scan::ScanArgs,
};
use peek_cli::config;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "peek",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect call-site expression extraction and index resolution"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level (overrides --verbose/--quiet)
    #[arg(long, global = true, value_enum)]
    log: Option<LogLevel>,

    /// Set log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the argument text of the primitive call on a source line
    Extract(ExtractArgs),

    /// Resolve the index sub-expressions of an expression
    Resolve(ResolveArgs),

    /// Evaluate an expression with the index evaluator
    Eval(EvalArgs),

    /// List po!/pv!/pe! call sites in Rust sources
    Scan(ScanArgs),
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, cli.log, cli.log_format)?;

    let config = config::load(cli.config.as_deref()).wrap_err("failed to load configuration")?;

    let result = match cli.command {
        Commands::Extract(args) => commands::extract_command(args, &config),
        Commands::Resolve(args) => commands::resolve_command(args),
        Commands::Eval(args) => commands::eval_command(args),
        Commands::Scan(args) => commands::scan_command(args),
    };

    match result {
        Ok(()) => {
            if cli.verbose > 0 {
                info!("Command completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            if cli.verbose > 0 {
                error!(?e, "detailed error context");
            }
            std::process::exit(1);
        }
    }
}

fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_level: Option<LogLevel>,
    log_format: LogFormat,
) -> eyre::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if let Some(level) = log_level {
        EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries command output
    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    match log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(formatter)
            .with(filter)
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(formatter.json())
            .with(filter)
            .try_init()?,
    }

    Ok(())
}
