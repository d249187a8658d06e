//! Azure landing zone
//!
//! Resource group, virtual network, a route table whose default route has
//! next hop `Internet`, an administrative network security group, and a
//! public and a private subnet per zone. Subnets reference the route table
//! and security group directly; there are no association resources.

use std::net::Ipv4Addr;

use serde_json::{json, Map, Value};
use tracing::info;

use landfall_common::{Cloud, Resource, Result, Stack};

use crate::{NetworkBuilder, NetworkSpec, NetworkTopology};

/// Azure's platform DNS resolver, reachable from every virtual network
pub const AZURE_DNS_RESOLVER: Ipv4Addr = Ipv4Addr::new(168, 63, 129, 16);

/// Declares Azure landing zones
#[derive(Clone, Debug)]
pub struct AzureLandingZone {
    route_name: String,
}

impl Default for AzureLandingZone {
    fn default() -> Self {
        Self {
            route_name: "default-internet".to_string(),
        }
    }
}

impl AzureLandingZone {
    fn located(spec: &NetworkSpec, mut properties: Value) -> Value {
        if let (Some(location), Value::Object(map)) = (&spec.location, &mut properties) {
            map.insert("location".to_string(), Value::String(location.clone()));
        }
        properties
    }
}

impl NetworkBuilder for AzureLandingZone {
    fn cloud(&self) -> Cloud {
        Cloud::Azure
    }

    fn declare(&self, spec: &NetworkSpec, stack: &mut Stack) -> Result<NetworkTopology> {
        let allocations = spec.block.plan().allocate(&spec.zones)?;

        let rg_name = format!("{}-rg", spec.name);
        let resource_group = Resource::new(&rg_name, "azure-native:resources:ResourceGroup")
            .with_properties(Self::located(spec, json!({ "tags": spec.tags(&rg_name) })));
        let rg_ref = resource_group.output("name");

        let vnet_name = format!("{}-vnet", spec.name);
        let vnet = Resource::new(&vnet_name, "azure-native:network:VirtualNetwork")
            .with_properties(Self::located(
                spec,
                json!({
                    "resourceGroupName": rg_ref,
                    "addressSpace": { "addressPrefixes": [spec.block.network().to_string()] },
                    "tags": spec.tags(&vnet_name),
                }),
            ))
            .with_parent(&resource_group.name);

        let rt_name = format!("{}-rt-public", spec.name);
        let route_table = Resource::new(&rt_name, "azure-native:network:RouteTable")
            .with_properties(Self::located(
                spec,
                json!({
                    "resourceGroupName": rg_ref,
                    "routes": [{
                        "name": self.route_name,
                        "addressPrefix": crate::aws::DEFAULT_ROUTE,
                        "nextHopType": "Internet",
                    }],
                    "tags": spec.tags(&rt_name),
                }),
            ))
            .with_parent(&resource_group.name);

        let nsg_name = format!("{}-nsg-admin", spec.name);
        let nsg = Resource::new(&nsg_name, "azure-native:network:NetworkSecurityGroup")
            .with_properties(Self::located(
                spec,
                json!({
                    "resourceGroupName": rg_ref,
                    "securityRules": [{
                        "name": "allow-ssh",
                        "priority": 100,
                        "direction": "Inbound",
                        "access": "Allow",
                        "protocol": "Tcp",
                        "sourcePortRange": "*",
                        "destinationPortRange": "22",
                        "sourceAddressPrefixes": spec.policy.admin_sources(&spec.block),
                        "destinationAddressPrefix": spec.block.network().to_string(),
                    }],
                    "tags": spec.tags(&nsg_name),
                }),
            ))
            .with_parent(&resource_group.name);

        let subnet = |tier: &str, zone: &str, cidr: String, public: bool| {
            let name = format!("{}-subnet-{}-{}", spec.name, tier, zone);
            let mut props = Map::new();
            props.insert("resourceGroupName".into(), json!(rg_ref));
            props.insert("virtualNetworkName".into(), json!(vnet.output("name")));
            props.insert("addressPrefix".into(), json!(cidr));
            props.insert(
                "networkSecurityGroup".into(),
                json!({ "id": nsg.id_ref() }),
            );
            if public {
                props.insert("routeTable".into(), json!({ "id": route_table.id_ref() }));
            } else {
                props.insert(
                    "defaultOutboundAccess".into(),
                    json!(spec.policy.private_subnet_public_ips),
                );
            }
            Resource::new(name, "azure-native:network:Subnet")
                .with_properties(Value::Object(props))
                .with_parent(&vnet.name)
        };

        let public: Vec<Resource> = allocations
            .iter()
            .map(|a| subnet("public", &a.zone, a.public.to_string(), true))
            .collect();
        let private: Vec<Resource> = allocations
            .iter()
            .map(|a| subnet("private", &a.zone, a.private.to_string(), false))
            .collect();

        let topology = NetworkTopology {
            cloud: Cloud::Azure,
            network: vnet.name.clone(),
            gateway: None,
            route_table: route_table.name.clone(),
            public_subnets: public.iter().map(|r| r.name.clone()).collect(),
            private_subnets: private.iter().map(|r| r.name.clone()).collect(),
            security_group: nsg.name.clone(),
            resource_group: Some(resource_group.name.clone()),
            block: spec.block,
            allocations,
            dns_resolver: AZURE_DNS_RESOLVER,
        };

        stack.add_resource(resource_group)?;
        stack.add_resource(vnet)?;
        stack.add_resource(route_table)?;
        stack.add_resource(nsg)?;
        for resource in public.into_iter().chain(private) {
            stack.add_resource(resource)?;
        }

        info!(
            network = %topology.network,
            block = %spec.block,
            zones = topology.allocations.len(),
            "declared Azure landing zone"
        );
        Ok(topology)
    }
}
