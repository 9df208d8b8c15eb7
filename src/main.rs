mod auth;
mod cli;
mod config;
mod error;
mod output;
mod providers;
mod synthesis;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use error::CITraceError;
use log::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting citrace");

    match cli.execute().await {
        Err(e) => match e.downcast_ref::<CITraceError>() {
            Some(CITraceError::NotReady(slug)) => {
                info!("Build {slug} has not finished yet, nothing to trace");
                std::process::exit(1);
            }
            Some(err) if err.is_transport() => {
                error!("Could not read build records from Buildkite");
                Err(e)
            }
            _ => Err(e),
        },
        ok => ok,
    }
}
