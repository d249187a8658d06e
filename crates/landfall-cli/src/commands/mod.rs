//! CLI commands

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use landfall_common::{Cloud, StackConfig};

use crate::Result;

pub mod kubeconfig;
pub mod render;
pub mod subnets;
pub mod validate;

/// Stack selection shared by every command that composes a stack
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Target cloud (aws or azure)
    #[arg(long, env = "LANDFALL_CLOUD", value_parser = parse_cloud)]
    pub cloud: Cloud,

    /// Stack file with a `config:` map of settings
    #[arg(short = 'c', long = "config", env = "LANDFALL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Settings given on the command line; these win over the stack file
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Address block for the virtual network
    #[arg(long)]
    pub cidr_block: Option<String>,

    /// Dotted mask for each subnet, e.g. 255.255.240.0
    #[arg(long)]
    pub subnet_mask: Option<String>,

    /// Base name for every declared resource
    #[arg(long)]
    pub service_name: Option<String>,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// Azure location
    #[arg(long)]
    pub location: Option<String>,

    /// Availability zones, comma separated
    #[arg(long, value_delimiter = ',')]
    pub zones: Option<Vec<String>>,
}

impl ConfigOverrides {
    fn into_config(self) -> StackConfig {
        StackConfig {
            cidr_block: self.cidr_block,
            subnet_mask: self.subnet_mask,
            service_name: self.service_name,
            region: self.region,
            location: self.location,
            availability_zones: self.zones,
            ..Default::default()
        }
    }
}

impl StackArgs {
    /// Stack file settings with command line overrides applied
    pub fn load_config(&self) -> Result<StackConfig> {
        load_config(self.config.as_deref(), self.overrides.clone())
    }
}

/// Read the optional stack file and overlay `overrides`
pub fn load_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<StackConfig> {
    let base = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading stack file");
            StackConfig::load(path)?
        }
        None => StackConfig::default(),
    };
    Ok(base.merge(overrides.into_config()))
}

fn parse_cloud(s: &str) -> std::result::Result<Cloud, String> {
    s.parse::<Cloud>().map_err(|e| e.to_string())
}
