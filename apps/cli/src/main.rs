//! injuryclass CLI: train a sports-injury type classifier and classify
//! player records against the trained model.
//!
//! Logs go to stderr; stdout carries only labels and reports.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
