//! AWS landing zone
//!
//! VPC with an internet gateway, one public route table, a public and a
//! private subnet per availability zone, and an administrative security
//! group.

use serde_json::json;
use tracing::info;

use landfall_common::{Cloud, Resource, Result, Stack};

use crate::{NetworkBuilder, NetworkSpec, NetworkTopology};

/// Route every public subnet sends to the gateway
pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// Offset of the VPC DNS resolver from the block base
const VPC_RESOLVER_OFFSET: u32 = 2;

/// Declares AWS landing zones
#[derive(Clone, Copy, Debug, Default)]
pub struct AwsLandingZone;

impl AwsLandingZone {
    fn vpc(spec: &NetworkSpec) -> Resource {
        let name = format!("{}-vpc", spec.name);
        Resource::new(&name, "aws:ec2:Vpc").with_properties(json!({
            "cidrBlock": spec.block.network().to_string(),
            "enableDnsSupport": true,
            "enableDnsHostnames": true,
            "tags": spec.tags(&name),
        }))
    }

    fn subnet(
        spec: &NetworkSpec,
        vpc: &Resource,
        tier: &str,
        zone: &str,
        cidr: String,
        public_ip: bool,
    ) -> Resource {
        let name = format!("{}-subnet-{}-{}", spec.name, tier, zone);
        Resource::new(&name, "aws:ec2:Subnet")
            .with_properties(json!({
                "vpcId": vpc.id_ref(),
                "cidrBlock": cidr,
                "availabilityZone": zone,
                "mapPublicIpOnLaunch": public_ip,
                "tags": spec.tags(&name),
            }))
            .with_parent(&vpc.name)
    }
}

impl NetworkBuilder for AwsLandingZone {
    fn cloud(&self) -> Cloud {
        Cloud::Aws
    }

    fn declare(&self, spec: &NetworkSpec, stack: &mut Stack) -> Result<NetworkTopology> {
        let allocations = spec.block.plan().allocate(&spec.zones)?;

        let vpc = Self::vpc(spec);

        let igw_name = format!("{}-igw", spec.name);
        let igw = Resource::new(&igw_name, "aws:ec2:InternetGateway")
            .with_properties(json!({
                "vpcId": vpc.id_ref(),
                "tags": spec.tags(&igw_name),
            }))
            .with_parent(&vpc.name);

        let rt_name = format!("{}-rt-public", spec.name);
        let route_table = Resource::new(&rt_name, "aws:ec2:RouteTable")
            .with_properties(json!({
                "vpcId": vpc.id_ref(),
                "routes": [{ "cidrBlock": DEFAULT_ROUTE, "gatewayId": igw.id_ref() }],
                "tags": spec.tags(&rt_name),
            }))
            .with_parent(&vpc.name);

        let sg_name = format!("{}-sg-admin", spec.name);
        let security_group = Resource::new(&sg_name, "aws:ec2:SecurityGroup")
            .with_properties(json!({
                "vpcId": vpc.id_ref(),
                "description": "Administrative SSH access",
                "ingress": [{
                    "protocol": "tcp",
                    "fromPort": 22,
                    "toPort": 22,
                    "cidrBlocks": spec.policy.admin_sources(&spec.block),
                }],
                "tags": spec.tags(&sg_name),
            }))
            .with_parent(&vpc.name);

        let mut public_subnets = Vec::with_capacity(allocations.len());
        let mut private_subnets = Vec::with_capacity(allocations.len());
        let mut subnets = Vec::with_capacity(allocations.len() * 3);

        for alloc in &allocations {
            let public = Self::subnet(
                spec,
                &vpc,
                "public",
                &alloc.zone,
                alloc.public.to_string(),
                true,
            );
            let association = Resource::new(
                format!("{}-rta-public-{}", spec.name, alloc.zone),
                "aws:ec2:RouteTableAssociation",
            )
            .with_properties(json!({
                "subnetId": public.id_ref(),
                "routeTableId": route_table.id_ref(),
            }))
            .with_parent(&route_table.name);
            public_subnets.push(public.name.clone());
            subnets.push(public);
            subnets.push(association);
        }
        for alloc in &allocations {
            let private = Self::subnet(
                spec,
                &vpc,
                "private",
                &alloc.zone,
                alloc.private.to_string(),
                spec.policy.private_subnet_public_ips,
            );
            private_subnets.push(private.name.clone());
            subnets.push(private);
        }

        let topology = NetworkTopology {
            cloud: Cloud::Aws,
            network: vpc.name.clone(),
            gateway: Some(igw.name.clone()),
            route_table: route_table.name.clone(),
            public_subnets,
            private_subnets,
            security_group: security_group.name.clone(),
            resource_group: None,
            block: spec.block,
            dns_resolver: spec
                .block
                .host(VPC_RESOLVER_OFFSET)
                .unwrap_or_else(|| spec.block.network().network()),
            allocations,
        };

        stack.add_resource(vpc)?;
        stack.add_resource(igw)?;
        stack.add_resource(route_table)?;
        for subnet in subnets {
            stack.add_resource(subnet)?;
        }
        stack.add_resource(security_group)?;

        info!(
            network = %topology.network,
            block = %spec.block,
            zones = topology.allocations.len(),
            "declared AWS landing zone"
        );
        Ok(topology)
    }
}
