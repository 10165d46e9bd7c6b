mod cli;
mod commands;
mod config;
mod model;
mod util;

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
        Commands::Extract(args) => commands::extract::run(args).map(|_| ()),
        Commands::Normalize(args) => commands::normalize::run(args).map(|_| ()),
        Commands::Categorize(args) => commands::categorize::run(args).map(|_| ()),
        Commands::Snippets(args) => commands::snippets::run(args).map(|_| ()),
        Commands::DryRun(args) => commands::dry_run::run(args).map(|_| ()),
        Commands::Merge(args) => commands::merge::run(args).map(|_| ()),
        Commands::Qa(args) => commands::qa::run(args).map(|_| ()),
        Commands::Pipeline(args) => commands::pipeline::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .init();
}
