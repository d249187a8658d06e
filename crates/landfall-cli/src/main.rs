//! landfall CLI
//!
//! Renders EKS/AKS landing zone stacks and inspects their outputs.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use landfall_cli::{Cli, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so rendered programs on stdout stay clean
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    cli.run().await
}
