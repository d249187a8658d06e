//! landfall CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// landfall - landing zone, managed Kubernetes and Helm stacks for AWS and Azure
#[derive(Parser, Debug)]
#[command(name = "landfall")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a stack as a YAML program for the provisioning engine
    Render(commands::render::RenderArgs),
    /// Show how the address block is split into subnets
    Subnets(commands::subnets::SubnetsArgs),
    /// Compose a stack and check its graph without rendering it
    Validate(commands::validate::ValidateArgs),
    /// Decode an exported kubeconfig and write it with owner-only permissions
    Kubeconfig(commands::kubeconfig::KubeconfigArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Render(args) => commands::render::run(args).await,
            Commands::Subnets(args) => commands::subnets::run(args),
            Commands::Validate(args) => commands::validate::run(args).await,
            Commands::Kubeconfig(args) => commands::kubeconfig::run(args).await,
        }
    }
}
