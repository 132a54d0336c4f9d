//! testrules CLI - lightweight method-level test runner.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use testrules::app::{self, Backends};
use testrules::config::DEFAULT_CONFIG_FILE;
use testrules::registry::Registry;

#[derive(Parser)]
#[command(name = "testrules")]
#[command(about = "Lightweight method-level test runner", long_about = None)]
#[command(version)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Command, test type, group name, or module names
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: logging already initialised");
    }

    // The binary ships without registered modules or backends; embedders
    // link the library, register their modules, and wire real backends.
    let registry = Registry::new();

    let code = app::run(
        &cli.tokens,
        &registry,
        Backends::default(),
        Path::new("."),
        &cli.config,
    );
    std::process::exit(code);
}
