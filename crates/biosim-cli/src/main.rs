//! Biosim CLI: the `biosim` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use support::Context;

fn main() {
    let cli = Cli::parse();
    support::init_logging(cli.global.verbose);
    let ctx = Context::from_global_or_exit(&cli.global);

    match cli.command {
        Commands::Universe { command } => commands::universe::run(command, &ctx),
        Commands::Ecosystem { command } => commands::ecosystem::run(command, &ctx),
        Commands::Species { command } => commands::species::run(command, &ctx),
        Commands::Model { command } => commands::prediction::run_model(command, &ctx),
        Commands::Prediction { command } => commands::prediction::run(command, &ctx),
        Commands::Listing { command } => commands::market::run(command, &ctx),
        Commands::Mint {
            amount,
            recipient,
            caller,
        } => commands::market::run_mint(amount, recipient, caller, &ctx),
        Commands::Balance { principal } => commands::market::run_balance(principal, &ctx),
        Commands::Show => commands::show::run(&ctx),
    }
}
