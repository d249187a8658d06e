//! Stack configuration
//!
//! Stack settings come from an engine-style stack file:
//!
//! ```yaml
//! config:
//!   landfall:cidrBlock: 10.255.0.0/16
//!   landfall:subnetMask: 255.255.240.0
//!   landfall:service_name: eks-helm
//!   aws:region: us-west-2
//! ```
//!
//! Keys may carry a `namespace:` prefix; the prefix is dropped when the key
//! is matched, with keys in the project namespace winning over others.
//! Every setting is optional and defaults are applied by the accessors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Error, Result, DEFAULT_CIDR_BLOCK, DEFAULT_OWNER, DEFAULT_SUBNET_MASK, PROJECT_NAME,
};

/// Target cloud for a stack
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    /// Amazon Web Services (EKS)
    Aws,
    /// Microsoft Azure (AKS)
    Azure,
}

impl Cloud {
    /// Service name used when none is configured
    pub fn default_service_name(&self) -> &'static str {
        match self {
            Cloud::Aws => "eks-helm",
            Cloud::Azure => "aks-helm",
        }
    }
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cloud::Aws => write!(f, "aws"),
            Cloud::Azure => write!(f, "azure"),
        }
    }
}

impl FromStr for Cloud {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aws" | "eks" => Ok(Cloud::Aws),
            "azure" | "aks" => Ok(Cloud::Azure),
            other => Err(Error::validation(format!(
                "unknown cloud '{}', expected aws or azure",
                other
            ))),
        }
    }
}

/// Externally supplied stack settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    /// Address block for the virtual network
    pub cidr_block: Option<String>,
    /// Dotted mask for each subnet
    pub subnet_mask: Option<String>,
    /// Base name for every declared resource
    #[serde(rename = "service_name")]
    pub service_name: Option<String>,
    /// Owner tag value
    pub owner: Option<String>,
    /// AWS region
    pub region: Option<String>,
    /// Azure location
    pub location: Option<String>,
    /// Availability zones; looked up from the cloud when absent
    pub availability_zones: Option<Vec<String>>,
    /// Kubernetes version of the control plane
    pub kubernetes_version: Option<String>,
    /// Worker instance type / VM size
    pub instance_type: Option<String>,
    /// Application namespace name
    pub namespace: Option<String>,
    /// Sources allowed to reach SSH on the administrative rule set
    pub admin_ingress_cidrs: Option<Vec<String>>,
    /// Sources allowed to reach the cluster on 80/443
    pub cluster_ingress_cidrs: Option<Vec<String>>,
    /// Whether private subnets auto-assign public IPs
    pub private_subnet_public_ips: Option<bool>,
}

#[derive(Deserialize)]
struct StackFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

impl StackConfig {
    /// Load a stack file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(path.display().to_string(), e.to_string()))?;
        Self::from_yaml_str(&text, &path.display().to_string())
    }

    /// Parse a stack file. `origin` is used in error messages.
    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self> {
        let file: StackFile =
            serde_yaml::from_str(text).map_err(|e| Error::config(origin, e.to_string()))?;

        let mut plain = serde_yaml::Mapping::new();
        let mut namespaced = serde_yaml::Mapping::new();
        for (key, value) in file.config {
            let (namespace, name) = match key.rsplit_once(':') {
                Some((namespace, name)) => (Some(namespace), name),
                None => (None, key.as_str()),
            };
            let target = if namespace == Some(PROJECT_NAME) {
                &mut namespaced
            } else {
                &mut plain
            };
            target.insert(name.to_string().into(), value);
        }
        for (key, value) in namespaced {
            plain.insert(key, value);
        }
        debug!(origin, keys = plain.len(), "parsed stack config");

        serde_yaml::from_value(serde_yaml::Value::Mapping(plain))
            .map_err(|e| Error::config(origin, e.to_string()))
    }

    /// Overlay every setting present in `overrides` on top of `self`
    pub fn merge(self, overrides: StackConfig) -> Self {
        Self {
            cidr_block: overrides.cidr_block.or(self.cidr_block),
            subnet_mask: overrides.subnet_mask.or(self.subnet_mask),
            service_name: overrides.service_name.or(self.service_name),
            owner: overrides.owner.or(self.owner),
            region: overrides.region.or(self.region),
            location: overrides.location.or(self.location),
            availability_zones: overrides.availability_zones.or(self.availability_zones),
            kubernetes_version: overrides.kubernetes_version.or(self.kubernetes_version),
            instance_type: overrides.instance_type.or(self.instance_type),
            namespace: overrides.namespace.or(self.namespace),
            admin_ingress_cidrs: overrides.admin_ingress_cidrs.or(self.admin_ingress_cidrs),
            cluster_ingress_cidrs: overrides
                .cluster_ingress_cidrs
                .or(self.cluster_ingress_cidrs),
            private_subnet_public_ips: overrides
                .private_subnet_public_ips
                .or(self.private_subnet_public_ips),
        }
    }

    /// `cidrBlock`, defaulted
    pub fn cidr_block(&self) -> &str {
        self.cidr_block.as_deref().unwrap_or(DEFAULT_CIDR_BLOCK)
    }

    /// `subnetMask`, defaulted
    pub fn subnet_mask(&self) -> &str {
        self.subnet_mask.as_deref().unwrap_or(DEFAULT_SUBNET_MASK)
    }

    /// `service_name`, defaulted per cloud
    pub fn service_name(&self, cloud: Cloud) -> &str {
        self.service_name
            .as_deref()
            .unwrap_or(cloud.default_service_name())
    }

    /// `owner`, defaulted
    pub fn owner(&self) -> &str {
        self.owner.as_deref().unwrap_or(DEFAULT_OWNER)
    }

    /// Check the settings that are not validated by the builders themselves
    pub fn validate(&self, cloud: Cloud) -> Result<()> {
        let name = self.service_name(cloud);
        if !is_dns_label(name) {
            return Err(Error::validation_for_field(
                name,
                "service_name",
                "must be 1-40 lowercase alphanumerics or '-', starting with a letter",
            ));
        }
        if let Some(ns) = &self.namespace {
            if !is_dns_label(ns) {
                return Err(Error::validation_for_field(
                    name,
                    "namespace",
                    format!("'{}' is not a valid namespace name", ns),
                ));
            }
        }
        if let Some(zones) = &self.availability_zones {
            if zones.is_empty() {
                return Err(Error::validation_for_field(
                    name,
                    "availabilityZones",
                    "must list at least one zone",
                ));
            }
        }
        Ok(())
    }
}

fn is_dns_label(s: &str) -> bool {
    (1..=40).contains(&s.len())
        && s.starts_with(|c: char| c.is_ascii_lowercase())
        && !s.ends_with('-')
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
