//! Access policy for the landing zone
//!
//! Which sources may reach administrative SSH and the cluster's HTTP(S)
//! ports, and whether private subnets hand out public IPs. Unset sources
//! default to the network's own block; private subnets stay private.

use std::str::FromStr;

use ipnet::Ipv4Net;

use landfall_common::{Error, Result, StackConfig};

use crate::AddressBlock;

/// Policy parameters applied by the network and cluster builders
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkPolicy {
    /// Sources allowed to reach SSH (22/tcp); empty means the network block
    pub admin_ingress_cidrs: Vec<Ipv4Net>,
    /// Sources allowed to reach the cluster on 80/443; empty means the network block
    pub cluster_ingress_cidrs: Vec<Ipv4Net>,
    /// Whether private subnets auto-assign public IPs on launch
    pub private_subnet_public_ips: bool,
}

/// Parse a list of CIDR strings for the config key `field`
pub fn parse_cidrs(field: &str, values: &[String]) -> Result<Vec<Ipv4Net>> {
    values
        .iter()
        .map(|v| {
            Ipv4Net::from_str(v.trim()).map(|n| n.trunc()).map_err(|e| {
                Error::validation_for_field(
                    landfall_common::error::UNKNOWN_CONTEXT,
                    field,
                    format!("'{}' is not a CIDR block: {}", v, e),
                )
            })
        })
        .collect()
}

impl NetworkPolicy {
    /// Read the policy parameters from stack config
    pub fn from_config(config: &StackConfig) -> Result<Self> {
        Ok(Self {
            admin_ingress_cidrs: parse_cidrs(
                "adminIngressCidrs",
                config.admin_ingress_cidrs.as_deref().unwrap_or_default(),
            )?,
            cluster_ingress_cidrs: parse_cidrs(
                "clusterIngressCidrs",
                config.cluster_ingress_cidrs.as_deref().unwrap_or_default(),
            )?,
            private_subnet_public_ips: config.private_subnet_public_ips.unwrap_or(false),
        })
    }

    /// Effective SSH sources
    pub fn admin_sources(&self, block: &AddressBlock) -> Vec<String> {
        sources_or_block(&self.admin_ingress_cidrs, block)
    }

    /// Effective cluster HTTP(S) sources
    pub fn cluster_sources(&self, block: &AddressBlock) -> Vec<String> {
        sources_or_block(&self.cluster_ingress_cidrs, block)
    }

    /// Whether any configured source is the whole internet
    pub fn allows_internet(&self) -> bool {
        self.admin_ingress_cidrs
            .iter()
            .chain(&self.cluster_ingress_cidrs)
            .any(|n| n.prefix_len() == 0)
    }
}

fn sources_or_block(cidrs: &[Ipv4Net], block: &AddressBlock) -> Vec<String> {
    if cidrs.is_empty() {
        vec![block.network().to_string()]
    } else {
        cidrs.iter().map(|c| c.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> AddressBlock {
        AddressBlock::parse("10.255.0.0/16", "255.255.240.0").expect("valid block")
    }

    #[test]
    fn defaults_are_closed() {
        let policy = NetworkPolicy::from_config(&StackConfig::default()).expect("policy");
        assert!(!policy.private_subnet_public_ips);
        assert_eq!(policy.admin_sources(&block()), vec!["10.255.0.0/16"]);
        assert_eq!(policy.cluster_sources(&block()), vec!["10.255.0.0/16"]);
        assert!(!policy.allows_internet());
    }

    #[test]
    fn configured_sources_replace_block() {
        let config = StackConfig {
            admin_ingress_cidrs: Some(vec!["203.0.113.0/24".into(), "0.0.0.0/0".into()]),
            private_subnet_public_ips: Some(true),
            ..Default::default()
        };
        let policy = NetworkPolicy::from_config(&config).expect("policy");
        assert_eq!(
            policy.admin_sources(&block()),
            vec!["203.0.113.0/24", "0.0.0.0/0"]
        );
        assert!(policy.private_subnet_public_ips);
        assert!(policy.allows_internet());
    }

    #[test]
    fn bad_cidr_names_the_field() {
        let config = StackConfig {
            cluster_ingress_cidrs: Some(vec!["nope".into()]),
            ..Default::default()
        };
        let err = NetworkPolicy::from_config(&config).unwrap_err();
        match err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("clusterIngressCidrs"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
