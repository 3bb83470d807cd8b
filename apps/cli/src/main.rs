//! recipeloader CLI: inspect and run source pipelines declared in
//! `recipeloader.toml`.

mod commands;
mod fs_source;

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
