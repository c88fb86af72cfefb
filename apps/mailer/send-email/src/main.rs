//! Send a single email with provider failover

use clap::Parser;
use eyre::Result;
use send_email::cli::Cli;
use send_email::telemetry::install_color_eyre;

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre()?;

    let cli = Cli::parse();
    send_email::run(cli).await
}
