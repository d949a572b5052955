use anyhow::Result;
use clap::Parser;
use ledgerstore::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ledgerstore::telemetry::init(cli.verbose);
    cli.run().await
}
