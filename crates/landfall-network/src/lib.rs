//! Landing zone networking
//!
//! This crate provides:
//! - Address planning ([`AddressBlock`], [`SubnetPlan`])
//! - The [`NetworkBuilder`] trait with AWS and Azure landing zones
//! - Availability zone discovery ([`ZoneSource`])
//! - Access policy parameters ([`NetworkPolicy`])

pub mod address;
pub mod aws;
pub mod azure;
pub mod policy;
pub mod zones;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use landfall_common::{output_ref, Cloud, Result, Stack};

pub use address::{mask_prefix_len, AddressBlock, SubnetPlan, SubnetTier, ZoneAllocation};
pub use aws::AwsLandingZone;
pub use azure::AzureLandingZone;
pub use policy::NetworkPolicy;
pub use zones::{AwsCliZones, StaticZones, ZoneSource};

#[cfg(test)]
pub use zones::MockZoneSource;

/// Inputs for one landing zone
#[derive(Clone, Debug)]
pub struct NetworkSpec {
    /// Base name for every declared resource
    pub name: String,
    /// Owner tag value
    pub owner: String,
    /// Address block and subnet size
    pub block: AddressBlock,
    /// Zones to place subnets in, in allocation order
    pub zones: Vec<String>,
    /// Access policy
    pub policy: NetworkPolicy,
    /// Region/location for clouds that need it on every resource
    pub location: Option<String>,
}

impl NetworkSpec {
    /// Standard tags for a named resource
    pub fn tags(&self, resource_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Name".to_string(), resource_name.to_string()),
            ("Owner".to_string(), self.owner.clone()),
        ])
    }
}

/// What a landing zone declared, by resource name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkTopology {
    /// Cloud the network was declared for
    pub cloud: Cloud,
    /// Virtual network resource
    pub network: String,
    /// Internet gateway resource (clouds with an explicit gateway)
    pub gateway: Option<String>,
    /// Public route table resource
    pub route_table: String,
    /// Public subnet resources, in zone order
    pub public_subnets: Vec<String>,
    /// Private subnet resources, in zone order
    pub private_subnets: Vec<String>,
    /// Administrative security rule set resource
    pub security_group: String,
    /// Resource group the network lives in (Azure)
    pub resource_group: Option<String>,
    /// Address block the network covers
    pub block: AddressBlock,
    /// Zones with their allocated ranges
    pub allocations: Vec<ZoneAllocation>,
    /// Network-local DNS resolver
    pub dns_resolver: Ipv4Addr,
}

impl NetworkTopology {
    /// `${network.id}`
    pub fn network_id(&self) -> String {
        output_ref(&self.network, "id")
    }

    /// `${subnet.id}` for every public subnet
    pub fn public_subnet_ids(&self) -> Vec<String> {
        self.public_subnets
            .iter()
            .map(|s| output_ref(s, "id"))
            .collect()
    }

    /// `${resourceGroup.name}` when the network has a resource group
    pub fn resource_group_name(&self) -> Option<String> {
        self.resource_group
            .as_deref()
            .map(|rg| output_ref(rg, "name"))
    }
}

/// Declares a landing zone into a stack
pub trait NetworkBuilder: Send + Sync {
    /// Cloud this builder targets
    fn cloud(&self) -> Cloud;

    /// Declare the network resources for `spec` and describe what was declared
    fn declare(&self, spec: &NetworkSpec, stack: &mut Stack) -> Result<NetworkTopology>;
}

/// Create the landing zone builder for a cloud
pub fn create_network_builder(cloud: Cloud) -> Box<dyn NetworkBuilder> {
    match cloud {
        Cloud::Aws => Box::new(AwsLandingZone),
        Cloud::Azure => Box::new(AzureLandingZone::default()),
    }
}
