mod catalog;
mod cli;
mod commands;
mod error;
mod http_client;
mod links;
mod model;
mod notify;
mod report;
mod sheets;
mod survey;
mod util;
mod valence;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Shelve(args) => commands::shelve::run(args),
        Commands::Summarize(args) => commands::summarize::run(args),
        Commands::Delta(args) => commands::delta::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Notify(args) => commands::notify::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
