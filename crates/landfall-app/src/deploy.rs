//! Application deployment into a declared cluster
//!
//! A namespace, a Helm release of the configured chart, and a lookup of the
//! chart's Service whose load balancer address is published. Everything is
//! scoped to the cluster's Kubernetes provider and removed together with the
//! control plane.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use tracing::info;

use landfall_cluster::ClusterTopology;
use landfall_common::{Cloud, Error, Resource, Result, Stack, StackConfig, PROJECT_NAME};

use crate::chart::ChartSpec;

/// What to deploy
#[derive(Clone, Debug, PartialEq)]
pub struct ApplicationSpec {
    /// Base name for every declared resource
    pub name: String,
    /// Kubernetes namespace the release is installed into
    pub namespace: String,
    /// Chart to install
    pub chart: ChartSpec,
}

impl ApplicationSpec {
    /// Default application for `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let name = service_name.into();
        Self {
            namespace: format!("{}-ns", name),
            name,
            chart: ChartSpec::default(),
        }
    }

    /// Application settings from stack config
    pub fn from_config(config: &StackConfig, cloud: Cloud) -> Self {
        let mut spec = Self::new(config.service_name(cloud));
        if let Some(namespace) = &config.namespace {
            spec.namespace = namespace.clone();
        }
        spec
    }
}

/// How the load balancer address of the service is reported
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointKind {
    /// DNS name (AWS ELB)
    Hostname,
    /// IP address (Azure load balancer)
    Ip,
}

impl EndpointKind {
    /// Address form the cloud's load balancers report
    pub fn for_cloud(cloud: Cloud) -> Self {
        match cloud {
            Cloud::Aws => EndpointKind::Hostname,
            Cloud::Azure => EndpointKind::Ip,
        }
    }

    /// Stack output the address is published under
    pub fn output_name(&self) -> &'static str {
        match self {
            EndpointKind::Hostname => "apache_service_hostname",
            EndpointKind::Ip => "apache_service_ip",
        }
    }

    fn ingress_field(&self) -> &'static str {
        match self {
            EndpointKind::Hostname => "hostname",
            EndpointKind::Ip => "ip",
        }
    }
}

/// What the deployer declared
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationDeployment {
    /// Namespace resource
    pub namespace: String,
    /// Helm release resource
    pub release: String,
    /// Service lookup resource
    pub service: String,
    /// Address form of the endpoint
    pub endpoint_kind: EndpointKind,
    /// Interpolation of the load balancer address
    pub endpoint: String,
}

/// Declares the application on top of a cluster
#[derive(Clone, Debug, Default)]
pub struct ApplicationDeployer;

impl ApplicationDeployer {
    /// Create a deployer
    pub fn new() -> Self {
        Self
    }

    fn namespace_metadata(spec: &ApplicationSpec) -> Result<serde_json::Value> {
        let metadata = ObjectMeta {
            name: Some(spec.namespace.clone()),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                PROJECT_NAME.to_string(),
            )])),
            ..Default::default()
        };
        serde_json::to_value(&metadata)
            .map_err(|e| Error::serialization_for("ObjectMeta", e.to_string()))
    }

    /// Declare namespace, release and service lookup
    pub fn deploy(
        &self,
        spec: &ApplicationSpec,
        cluster: &ClusterTopology,
        stack: &mut Stack,
    ) -> Result<ApplicationDeployment> {
        let control_plane = cluster.control_plane.as_str();
        let provider = cluster.k8s_provider.as_str();

        let namespace = Resource::new(format!("{}-k8s-ns", spec.name), "kubernetes:core/v1:Namespace")
            .with_properties(json!({ "metadata": Self::namespace_metadata(spec)? }))
            .with_provider(provider)
            .with_parent(control_plane)
            .with_depends_on(control_plane)
            .with_deleted_with(control_plane);
        let namespace_name = namespace.output("metadata.name");

        let release_name = spec.chart.release_name(&spec.name);
        let mut properties = json!({
            "name": release_name,
            "chart": spec.chart.chart,
            "version": spec.chart.version,
            "namespace": namespace_name,
            "repositoryOpts": { "repo": spec.chart.repository },
        });
        if let Some(values) = &spec.chart.values {
            properties["values"] = values.clone();
        }
        let release = Resource::new(&release_name, "kubernetes:helm.sh/v3:Release")
            .with_properties(properties)
            .with_provider(provider)
            .with_parent(&namespace.name)
            .with_depends_on(control_plane)
            .with_deleted_with(control_plane);

        let service = Resource::lookup(
            format!("{}-apache-service", spec.name),
            "kubernetes:core/v1:Service",
            format!("{}/{}", namespace_name, release.output("name")),
        )
        .with_provider(provider)
        .with_parent(&release.name);

        let endpoint_kind = EndpointKind::for_cloud(cluster.cloud);
        let deployment = ApplicationDeployment {
            namespace: namespace.name.clone(),
            release: release.name.clone(),
            service: service.name.clone(),
            endpoint_kind,
            endpoint: service.output(&format!(
                "status.loadBalancer.ingress[0].{}",
                endpoint_kind.ingress_field()
            )),
        };

        stack.add_resource(namespace)?;
        stack.add_resource(release)?;
        stack.add_resource(service)?;

        info!(
            namespace = %spec.namespace,
            chart = %spec.chart.chart,
            version = %spec.chart.version,
            "declared application"
        );
        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landfall_cluster::{ClusterIdentity, NodePoolScaling};

    fn cluster(cloud: Cloud) -> (Stack, ClusterTopology) {
        let mut stack = Stack::new("test");
        for name in ["cp", "k8s"] {
            stack
                .add_resource(Resource::new(name, "test:index:Resource"))
                .expect("declare");
        }
        stack
            .add_secret_variable("kc", json!("${cp.kubeconfig}"))
            .expect("variable");
        let topology = ClusterTopology {
            cloud,
            identity: ClusterIdentity {
                role: "cp".into(),
                grants: vec![],
            },
            control_plane: "cp".into(),
            node_pool: "cp".into(),
            scaling: NodePoolScaling::fixed(1),
            kubeconfig: "kc".into(),
            k8s_provider: "k8s".into(),
        };
        (stack, topology)
    }

    #[test]
    fn namespace_is_scoped_to_cluster() {
        let (mut stack, topology) = cluster(Cloud::Aws);
        let deployment = ApplicationDeployer::new()
            .deploy(&ApplicationSpec::new("eks-helm"), &topology, &mut stack)
            .expect("deploy");
        let ns = stack.resource(&deployment.namespace).expect("namespace");
        assert_eq!(ns.name, "eks-helm-k8s-ns");
        assert_eq!(ns.properties["metadata"]["name"], "eks-helm-ns");
        assert_eq!(ns.options.provider.as_deref(), Some("k8s"));
        assert_eq!(ns.options.depends_on, vec!["cp"]);
        assert_eq!(ns.options.deleted_with.as_deref(), Some("cp"));
        stack.validate().expect("valid stack");
    }

    #[test]
    fn release_pins_chart() {
        let (mut stack, topology) = cluster(Cloud::Aws);
        let deployment = ApplicationDeployer::new()
            .deploy(&ApplicationSpec::new("eks-helm"), &topology, &mut stack)
            .expect("deploy");
        let release = stack.resource(&deployment.release).expect("release");
        assert_eq!(release.name, "eks-helm-apache-chart");
        assert_eq!(release.properties["chart"], "apache");
        assert_eq!(release.properties["version"], "11.2.4");
        assert_eq!(
            release.properties["repositoryOpts"]["repo"],
            "https://charts.bitnami.com/bitnami"
        );
        assert_eq!(release.properties["namespace"], "${eks-helm-k8s-ns.metadata.name}");
        assert_eq!(release.options.deleted_with.as_deref(), Some("cp"));
    }

    #[test]
    fn endpoint_shape_follows_cloud() {
        let (mut stack, topology) = cluster(Cloud::Aws);
        let aws = ApplicationDeployer::new()
            .deploy(&ApplicationSpec::new("eks-helm"), &topology, &mut stack)
            .expect("deploy");
        assert_eq!(aws.endpoint_kind.output_name(), "apache_service_hostname");
        assert_eq!(
            aws.endpoint,
            "${eks-helm-apache-service.status.loadBalancer.ingress[0].hostname}"
        );

        let (mut stack, topology) = cluster(Cloud::Azure);
        let azure = ApplicationDeployer::new()
            .deploy(&ApplicationSpec::new("aks-helm"), &topology, &mut stack)
            .expect("deploy");
        assert_eq!(azure.endpoint_kind.output_name(), "apache_service_ip");
        assert!(azure.endpoint.ends_with(".ip}"));
    }

    #[test]
    fn service_is_looked_up_not_created() {
        let (mut stack, topology) = cluster(Cloud::Azure);
        let deployment = ApplicationDeployer::new()
            .deploy(&ApplicationSpec::new("aks-helm"), &topology, &mut stack)
            .expect("deploy");
        let service = stack.resource(&deployment.service).expect("service");
        assert_eq!(
            service.get.as_ref().map(|g| g["id"].clone()),
            Some(json!(
                "${aks-helm-k8s-ns.metadata.name}/${aks-helm-apache-chart.name}"
            ))
        );
    }

    #[test]
    fn configured_namespace_wins() {
        let config = StackConfig {
            namespace: Some("web".into()),
            ..Default::default()
        };
        let spec = ApplicationSpec::from_config(&config, Cloud::Azure);
        assert_eq!(spec.name, "aks-helm");
        assert_eq!(spec.namespace, "web");
    }
}
