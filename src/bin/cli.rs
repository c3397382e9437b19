//! refgraph CLI - find what references your assets.
//!
//! Usage:
//!   refgraph scan                         # Build or load the dependency cache
//!   refgraph deps <asset>                 # Cached direct dependencies
//!   refgraph search <target>... [--out F] # Reverse reference graph
//!   refgraph show <file>                  # Print a saved result
//!   refgraph clear-cache                  # Delete the dependency cache

use clap::Parser;
use refgraph::cli::{run, Cli};

fn main() {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
