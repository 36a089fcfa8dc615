//! fieldtime CLI - clock drive, work and lunch time from the terminal
//!
//! Every action lands in the local store first; uploads happen right away when
//! a token is available and otherwise on the next `fieldtime sync`.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::{CommandFactory, Parser};
use fieldtime_core::clock::ClockAction;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, DriveCommands, LunchCommands};
use crate::commands::clock::run_clock_action;
use crate::commands::common::{normalize_customer, CommandContext};
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::list::{run_list, run_pending};
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "fieldtime=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    // Config commands work before any profile is complete, so the store is
    // only opened by the commands that need it
    let profile = cli.profile.as_deref();
    let (db_path, token) = (cli.db_path, cli.token);
    let load = move || CommandContext::load(db_path, profile, token);

    match command {
        Commands::Config { command } => run_config(command, profile),
        Commands::Status { json } => run_status(&load()?, json).await,
        Commands::ClockIn { customer } => {
            let customer = normalize_customer(&customer);
            run_clock_action(&load()?, ClockAction::ClockIn { customer }).await
        }
        Commands::ClockOut => run_clock_action(&load()?, ClockAction::ClockOut).await,
        Commands::Drive { command } => {
            let action = match command {
                DriveCommands::Start { customer } => ClockAction::StartDriving {
                    customer: normalize_customer(&customer),
                },
                DriveCommands::End => ClockAction::EndDriving,
            };
            run_clock_action(&load()?, action).await
        }
        Commands::Lunch { command } => {
            let action = match command {
                LunchCommands::Start => ClockAction::StartLunch,
                LunchCommands::End => ClockAction::EndLunch,
            };
            run_clock_action(&load()?, action).await
        }
        Commands::List { all, json } => run_list(&load()?, all, json).await,
        Commands::Pending { json } => run_pending(&load()?, json).await,
        Commands::Delete { id } => run_delete(&load()?, &id).await,
        Commands::Sync { watch } => run_sync(&load()?, watch).await,
    }
}
