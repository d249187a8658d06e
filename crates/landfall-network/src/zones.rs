//! Availability zone discovery
//!
//! Subnets are planned per zone, so the zone list must be known when the
//! stack is built. It comes either from configuration or from the AWS CLI.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use landfall_common::{Error, Result};

/// Zone numbers used for Azure regions with availability zone support
pub const AZURE_ZONES: &[&str] = &["1", "2", "3"];

/// Source of availability zone names
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ZoneSource: Send + Sync {
    /// Zone names in the order subnets are allocated
    async fn availability_zones(&self) -> Result<Vec<String>>;
}

/// A fixed list of zones
#[derive(Clone, Debug, Default)]
pub struct StaticZones {
    zones: Vec<String>,
}

impl StaticZones {
    /// Use the given zones
    pub fn new(zones: Vec<String>) -> Self {
        Self { zones }
    }

    /// Zones for Azure regions
    pub fn azure() -> Self {
        Self::new(AZURE_ZONES.iter().map(|z| z.to_string()).collect())
    }
}

#[async_trait]
impl ZoneSource for StaticZones {
    async fn availability_zones(&self) -> Result<Vec<String>> {
        Ok(self.zones.clone())
    }
}

/// Zones reported by `aws ec2 describe-availability-zones`
#[derive(Clone, Debug, Default)]
pub struct AwsCliZones {
    region: Option<String>,
}

impl AwsCliZones {
    /// Query zones in `region`, or the CLI's default region when `None`
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAvailabilityZones {
    availability_zones: Vec<AvailabilityZone>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AvailabilityZone {
    zone_name: String,
    #[serde(default)]
    zone_type: Option<String>,
}

/// Extract standard availability zones from `describe-availability-zones` JSON.
///
/// Local and wavelength zones are skipped.
pub fn parse_describe_zones(json: &str) -> Result<Vec<String>> {
    let parsed: DescribeAvailabilityZones = serde_json::from_str(json)
        .map_err(|e| Error::serialization_for("DescribeAvailabilityZones", e.to_string()))?;
    Ok(parsed
        .availability_zones
        .into_iter()
        .filter(|z| {
            z.zone_type
                .as_deref()
                .map_or(true, |t| t == "availability-zone")
        })
        .map(|z| z.zone_name)
        .collect())
}

#[async_trait]
impl ZoneSource for AwsCliZones {
    async fn availability_zones(&self) -> Result<Vec<String>> {
        let mut cmd = Command::new("aws");
        cmd.args([
            "ec2",
            "describe-availability-zones",
            "--filters",
            "Name=state,Values=available",
            "--output",
            "json",
        ]);
        if let Some(region) = &self.region {
            cmd.args(["--region", region.as_str()]);
        }
        debug!(region = ?self.region, "querying availability zones");

        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(Error::provider(
                "aws",
                format!(
                    "describe-availability-zones failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        let zones = parse_describe_zones(&String::from_utf8_lossy(&output.stdout))?;
        if zones.is_empty() {
            return Err(Error::provider("aws", "no available zones reported"));
        }
        info!(count = zones.len(), "discovered availability zones");
        Ok(zones)
    }
}
