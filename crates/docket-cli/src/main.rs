//! Docket CLI: the `docket` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Init { json } => commands::init::run(cli.dir, json),

        Commands::Request { command } => commands::request::run(cli.dir, command),

        Commands::Claim {
            id,
            user,
            ttl,
            hold,
            json,
        } => commands::claim::run_claim(cli.dir, id, user, ttl, hold, json),

        Commands::Release { id, user, json } => {
            commands::claim::run_release(cli.dir, id, user, json)
        }

        Commands::Override {
            id,
            user,
            coordinator,
            json,
        } => commands::claim::run_override(cli.dir, id, user, coordinator, json),
    }
}
