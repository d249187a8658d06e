//! Managed cluster provider abstraction
//!
//! Each cloud implements [`ClusterProvider`] to declare an identity, a
//! managed control plane, a worker pool, a secret kubeconfig and a
//! Kubernetes provider bound to it. Both variants produce the same
//! [`ClusterTopology`], so the application layer never branches on cloud
//! for anything but the endpoint shape.
//!
//! # Supported Providers
//!
//! - [`EksProvider`] - AWS EKS via the `eks` package
//! - [`AksProvider`] - Azure AKS via `azure-native`

mod aks;
mod eks;

pub use aks::AksProvider;
pub use eks::EksProvider;

use async_trait::async_trait;
use serde_json::json;

use landfall_common::{reference, Cloud, Error, Resource, Result, Stack, StackConfig};
use landfall_network::{NetworkPolicy, NetworkTopology};

use crate::constants::{
    AKS_DEFAULT_KUBERNETES_VERSION, AKS_DEFAULT_VM_SIZE, AKS_MAX_PODS, AKS_NODE_COUNT,
    AKS_OS_DISK_SIZE_GB, EKS_DEFAULT_INSTANCE_TYPE, EKS_DEFAULT_KUBERNETES_VERSION,
    EKS_DEFAULT_SCALING, KUBERNETES_PROVIDER_TYPE,
};

/// Worker pool size bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodePoolScaling {
    /// Fewest nodes
    pub min: u32,
    /// Nodes at creation
    pub desired: u32,
    /// Most nodes
    pub max: u32,
}

impl NodePoolScaling {
    /// A pool with a fixed node count
    pub fn fixed(count: u32) -> Self {
        Self {
            min: count,
            desired: count,
            max: count,
        }
    }

    /// Whether the pool can change size
    pub fn autoscales(&self) -> bool {
        self.min != self.max
    }

    /// Check `1 <= min <= desired <= max`
    pub fn validate(&self) -> Result<()> {
        if self.min < 1 {
            return Err(Error::validation(format!(
                "node pool minimum must be at least 1, got {}",
                self.min
            )));
        }
        if !(self.min <= self.desired && self.desired <= self.max) {
            return Err(Error::validation(format!(
                "node pool scaling must satisfy min <= desired <= max, got {{min: {}, desired: {}, max: {}}}",
                self.min, self.desired, self.max
            )));
        }
        Ok(())
    }
}

/// Worker pool shape
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodePoolSpec {
    /// Instance type (EKS) or VM size (AKS)
    pub instance_type: String,
    /// Size bounds
    pub scaling: NodePoolScaling,
    /// Pod limit per node (AKS)
    pub max_pods: Option<u32>,
    /// OS disk size in GB (AKS)
    pub os_disk_size_gb: Option<u32>,
}

/// Everything a provider needs to declare a cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Base name for every declared resource
    pub name: String,
    /// Owner tag value
    pub owner: String,
    /// Control plane Kubernetes version
    pub kubernetes_version: String,
    /// Worker pool
    pub node_pool: NodePoolSpec,
    /// Access policy shared with the network
    pub policy: NetworkPolicy,
    /// Azure location
    pub location: Option<String>,
}

impl ClusterSpec {
    /// Defaults for `cloud` with the given base name
    pub fn defaults(cloud: Cloud, name: impl Into<String>) -> Self {
        let (kubernetes_version, node_pool) = match cloud {
            Cloud::Aws => {
                let (min, desired, max) = EKS_DEFAULT_SCALING;
                (
                    EKS_DEFAULT_KUBERNETES_VERSION,
                    NodePoolSpec {
                        instance_type: EKS_DEFAULT_INSTANCE_TYPE.to_string(),
                        scaling: NodePoolScaling { min, desired, max },
                        max_pods: None,
                        os_disk_size_gb: None,
                    },
                )
            }
            Cloud::Azure => (
                AKS_DEFAULT_KUBERNETES_VERSION,
                NodePoolSpec {
                    instance_type: AKS_DEFAULT_VM_SIZE.to_string(),
                    scaling: NodePoolScaling::fixed(AKS_NODE_COUNT),
                    max_pods: Some(AKS_MAX_PODS),
                    os_disk_size_gb: Some(AKS_OS_DISK_SIZE_GB),
                },
            ),
        };
        Self {
            name: name.into(),
            owner: landfall_common::DEFAULT_OWNER.to_string(),
            kubernetes_version: kubernetes_version.to_string(),
            node_pool,
            policy: NetworkPolicy::default(),
            location: None,
        }
    }

    /// Defaults for `cloud` overlaid with stack config
    pub fn from_config(config: &StackConfig, cloud: Cloud) -> Result<Self> {
        let mut spec = Self::defaults(cloud, config.service_name(cloud));
        spec.owner = config.owner().to_string();
        if let Some(version) = &config.kubernetes_version {
            spec.kubernetes_version = version.clone();
        }
        if let Some(instance_type) = &config.instance_type {
            spec.node_pool.instance_type = instance_type.clone();
        }
        spec.policy = NetworkPolicy::from_config(config)?;
        spec.location = config.location.clone();
        Ok(spec)
    }
}

/// Identity the control plane and workers act as
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterIdentity {
    /// Role or service principal resource
    pub role: String,
    /// Permission grant resources, in declaration order
    pub grants: Vec<String>,
}

/// What a provider declared, by resource name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterTopology {
    /// Cloud the cluster runs on
    pub cloud: Cloud,
    /// Cluster identity
    pub identity: ClusterIdentity,
    /// Managed control plane resource
    pub control_plane: String,
    /// Resource that declares the worker pool. On AKS the pool is inline,
    /// so this is the control plane itself.
    pub node_pool: String,
    /// Worker pool size bounds
    pub scaling: NodePoolScaling,
    /// Secret variable holding the kubeconfig
    pub kubeconfig: String,
    /// Kubernetes provider resource bound to the kubeconfig
    pub k8s_provider: String,
}

impl ClusterTopology {
    /// `${kubeconfig}`
    pub fn kubeconfig_ref(&self) -> String {
        reference(&self.kubeconfig)
    }
}

/// Managed Kubernetes cluster provider
///
/// Implementations declare their resources into a [`Stack`] on top of an
/// already declared network.
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Cloud this provider targets
    fn cloud(&self) -> Cloud;

    /// Validate the cluster specification
    ///
    /// Returns `Ok(())` if the spec can be declared by this provider, or an
    /// error describing what's wrong.
    async fn validate_spec(&self, spec: &ClusterSpec) -> Result<()>;

    /// Declare the cluster resources
    ///
    /// # Arguments
    ///
    /// * `spec` - Cluster shape and naming
    /// * `network` - The network the cluster is placed in
    /// * `stack` - Stack the resources are appended to
    async fn declare(
        &self,
        spec: &ClusterSpec,
        network: &NetworkTopology,
        stack: &mut Stack,
    ) -> Result<ClusterTopology>;
}

/// Create the provider for a cloud
pub fn create_provider(cloud: Cloud) -> Box<dyn ClusterProvider> {
    match cloud {
        Cloud::Aws => Box::new(EksProvider::new()),
        Cloud::Azure => Box::new(AksProvider::new()),
    }
}

/// Validate Kubernetes version format
///
/// Accepts versions in format "1.x", "1.x.x" or "v1.x.x".
pub fn validate_k8s_version(version: &str) -> Result<()> {
    let bare = version.strip_prefix('v').unwrap_or(version);
    let parts: Vec<&str> = bare.split('.').collect();
    let numeric = parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if parts.first() != Some(&"1") || !(2..=3).contains(&parts.len()) || !numeric {
        return Err(Error::validation(format!(
            "invalid kubernetes version: {version}, expected format: 1.x, 1.x.x or v1.x.x"
        )));
    }
    Ok(())
}

/// Checks shared by every provider
pub(crate) fn validate_common(spec: &ClusterSpec) -> Result<()> {
    if spec.name.is_empty() {
        return Err(Error::validation("cluster name required"));
    }
    validate_k8s_version(&spec.kubernetes_version)?;
    if spec.node_pool.instance_type.trim().is_empty() {
        return Err(Error::validation_for_field(
            &spec.name,
            "instanceType",
            "instance type must not be empty",
        ));
    }
    spec.node_pool.scaling.validate()
}

/// Declare the kubeconfig-bound Kubernetes provider
pub(crate) fn kubernetes_provider(
    spec: &ClusterSpec,
    kubeconfig: &str,
    control_plane: &str,
) -> Resource {
    Resource::new(format!("{}-k8s-provider", spec.name), KUBERNETES_PROVIDER_TYPE)
        .with_properties(json!({ "kubeconfig": reference(kubeconfig) }))
        .with_parent(control_plane)
}

/// `${name.id}` references for the network's public subnets, or an error if
/// there are none
pub(crate) fn public_subnet_ids(cloud: Cloud, network: &NetworkTopology) -> Result<Vec<String>> {
    if network.public_subnets.is_empty() {
        return Err(Error::provider(
            cloud.to_string(),
            format!("network {} has no public subnets", network.network),
        ));
    }
    Ok(network.public_subnet_ids())
}
