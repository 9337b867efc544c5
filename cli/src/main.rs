mod cli;
mod config;
mod dryrun;
mod error;
mod logger;

use crate::error::Error;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Error> {
    color_eyre::install()?;
    logger::init();

    Ok(cli::Cli::parse().run().await?)
}
