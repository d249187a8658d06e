//! Stack composition
//!
//! Wires network, cluster and application for one cloud into a single
//! validated [`Stack`] and publishes its outputs.

use tracing::{info, instrument};

use landfall_cluster::{create_provider, ClusterSpec, ClusterTopology};
use landfall_common::{Cloud, Result, Stack, StackConfig};
use landfall_network::{
    create_network_builder, AddressBlock, AwsCliZones, NetworkPolicy, NetworkSpec,
    NetworkTopology, StaticZones, ZoneSource,
};

use crate::deploy::{ApplicationDeployer, ApplicationDeployment, ApplicationSpec};

/// A composed stack and what each layer declared
#[derive(Clone, Debug)]
pub struct Composition {
    /// The validated stack
    pub stack: Stack,
    /// Network layer
    pub network: NetworkTopology,
    /// Cluster layer
    pub cluster: ClusterTopology,
    /// Application layer
    pub application: ApplicationDeployment,
}

/// Output name of the network id
pub fn network_output_name(cloud: Cloud) -> &'static str {
    match cloud {
        Cloud::Aws => "vpc_id",
        Cloud::Azure => "vnet_id",
    }
}

/// Output name of the kubeconfig
pub const KUBECONFIG_OUTPUT: &str = "kubeconfig";

/// Where zone names come from for this config: the configured list, the AWS
/// CLI, or Azure's numbered zones
pub fn zone_source(config: &StackConfig, cloud: Cloud) -> Box<dyn ZoneSource> {
    match (&config.availability_zones, cloud) {
        (Some(zones), _) => Box::new(StaticZones::new(zones.clone())),
        (None, Cloud::Aws) => Box::new(AwsCliZones::new(config.region.clone())),
        (None, Cloud::Azure) => Box::new(StaticZones::azure()),
    }
}

fn description(cloud: Cloud) -> &'static str {
    match cloud {
        Cloud::Aws => "Landing zone, EKS cluster and Apache Helm chart",
        Cloud::Azure => "Landing zone, AKS cluster and Apache Helm chart",
    }
}

/// Compose the full stack for `cloud`
#[instrument(skip(config, zones))]
pub async fn compose_stack(
    config: &StackConfig,
    cloud: Cloud,
    zones: &dyn ZoneSource,
) -> Result<Composition> {
    config.validate(cloud)?;
    let name = config.service_name(cloud).to_string();
    let block = AddressBlock::parse(config.cidr_block(), config.subnet_mask())?;
    let policy = NetworkPolicy::from_config(config)?;
    let zone_names = zones.availability_zones().await?;

    let mut stack = Stack::new(name.clone()).with_description(description(cloud));

    let network_spec = NetworkSpec {
        name: name.clone(),
        owner: config.owner().to_string(),
        block,
        zones: zone_names,
        policy,
        location: config.location.clone(),
    };
    let network = create_network_builder(cloud).declare(&network_spec, &mut stack)?;

    let cluster_spec = ClusterSpec::from_config(config, cloud)?;
    let cluster = create_provider(cloud)
        .declare(&cluster_spec, &network, &mut stack)
        .await?;

    let application = ApplicationDeployer::new().deploy(
        &ApplicationSpec::from_config(config, cloud),
        &cluster,
        &mut stack,
    )?;

    stack.export(network_output_name(cloud), network.network_id())?;
    stack.export_secret(KUBECONFIG_OUTPUT, cluster.kubeconfig_ref())?;
    stack.export(
        application.endpoint_kind.output_name(),
        application.endpoint.clone(),
    )?;

    stack.validate()?;
    info!(
        stack = %stack.name(),
        resources = stack.resources().len(),
        "composed stack"
    );

    Ok(Composition {
        stack,
        network,
        cluster,
        application,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use landfall_common::Error;
    use mockall::mock;

    mock! {
        Zones {}

        #[async_trait]
        impl ZoneSource for Zones {
            async fn availability_zones(&self) -> Result<Vec<String>>;
        }
    }

    fn zones(names: &[&str]) -> MockZones {
        let names: Vec<String> = names.iter().map(|z| z.to_string()).collect();
        let mut source = MockZones::new();
        source
            .expect_availability_zones()
            .times(1)
            .returning(move || Ok(names.clone()));
        source
    }

    #[tokio::test]
    async fn composes_aws_stack() {
        let composition = compose_stack(
            &StackConfig::default(),
            Cloud::Aws,
            &zones(&["us-west-2a", "us-west-2b", "us-west-2c"]),
        )
        .await
        .expect("compose");
        let stack = &composition.stack;
        assert_eq!(stack.name(), "eks-helm");
        assert_eq!(
            stack.output("vpc_id").map(|o| o.value.clone()),
            Some(serde_json::json!("${eks-helm-vpc.id}"))
        );
        assert!(stack.output("kubeconfig").is_some_and(|o| o.secret));
        assert!(stack.output("apache_service_hostname").is_some());
        assert_eq!(composition.network.public_subnets.len(), 3);
    }

    #[tokio::test]
    async fn composes_azure_stack() {
        let config = StackConfig {
            location: Some("westeurope".into()),
            ..Default::default()
        };
        let composition = compose_stack(&config, Cloud::Azure, &zones(&["1", "2", "3"]))
            .await
            .expect("compose");
        let stack = &composition.stack;
        assert!(stack.output("vnet_id").is_some());
        assert!(stack.output("apache_service_ip").is_some());
        assert_eq!(composition.cluster.control_plane, "aks-helm-cluster");
    }

    #[tokio::test]
    async fn zone_lookup_failure_propagates() {
        let mut source = MockZones::new();
        source
            .expect_availability_zones()
            .returning(|| Err(Error::provider("aws", "no credentials")));
        let err = compose_stack(&StackConfig::default(), Cloud::Aws, &source)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[tokio::test]
    async fn bad_mask_fails_before_zone_lookup() {
        let config = StackConfig {
            subnet_mask: Some("255.0.0.0".into()),
            ..Default::default()
        };
        let mut source = MockZones::new();
        source.expect_availability_zones().never();
        let err = compose_stack(&config, Cloud::Aws, &source).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn configured_zones_skip_discovery() {
        let config = StackConfig {
            availability_zones: Some(vec!["eu-west-1a".into()]),
            ..Default::default()
        };
        let source = zone_source(&config, Cloud::Aws);
        assert_eq!(
            source.availability_zones().await.expect("zones"),
            vec!["eu-west-1a"]
        );
    }
}
