//! Mobile UI test-plan runner CLI
//!
//! Runs a tree of UI tests against a connected Android or iOS device and
//! prints a pass/fail tree.

use clap::Parser;
use commands::Commands;
use testrunner::common::logging;
use testrunner::{cli, commands};

#[derive(Parser)]
#[command(name = "testrunner", about = "Mobile UI test-plan runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        if e.is_configuration() {
            eprintln!("Run 'testrunner config' to see the effective configuration.");
        }
        std::process::exit(1);
    }
}
