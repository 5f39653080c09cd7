//! TopicDoc CLI: subject in, sourced MDX document out.
//!
//! Discovers web sources for a subject, fetches them, and has a language model
//! write a normalized MDX document, falling back to model knowledge when the
//! web turns up nothing useful.

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
