//! Centralized constants for the landfall-cluster crate

use std::time::Duration;

// =============================================================================
// Shared
// =============================================================================

/// Type token of the Kubernetes provider resource bound to a cluster
pub const KUBERNETES_PROVIDER_TYPE: &str = "pulumi:providers:kubernetes";

/// How long the engine waits for a node pool to become ready
pub const NODE_POOL_CREATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

// =============================================================================
// EKS
// =============================================================================

/// Control plane version when none is configured
pub const EKS_DEFAULT_KUBERNETES_VERSION: &str = "1.30";

/// Worker instance type when none is configured
pub const EKS_DEFAULT_INSTANCE_TYPE: &str = "t3.medium";

/// Service principal allowed to assume the cluster role
pub const EKS_ROLE_TRUSTED_SERVICE: &str = "ec2.amazonaws.com";

/// Managed policies attached to the cluster role, in attachment order
pub const EKS_MANAGED_POLICY_ARNS: [&str; 4] = [
    "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy",
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
];

/// Control plane log types shipped to CloudWatch
pub const EKS_CLUSTER_LOG_TYPES: [&str; 5] = [
    "api",
    "audit",
    "authenticator",
    "controllerManager",
    "scheduler",
];

/// Default storage class created in the cluster
pub const EKS_STORAGE_CLASS: &str = "gp2";

/// Worker scaling bounds: (min, desired, max)
pub const EKS_DEFAULT_SCALING: (u32, u32, u32) = (1, 2, 2);

// =============================================================================
// AKS
// =============================================================================

/// Control plane version when none is configured
pub const AKS_DEFAULT_KUBERNETES_VERSION: &str = "1.29.2";

/// Worker VM size when none is configured
pub const AKS_DEFAULT_VM_SIZE: &str = "Standard_DS2_v2";

/// Name of the system agent pool
pub const AKS_AGENT_POOL_NAME: &str = "agentpool";

/// Fixed node count of the system agent pool
pub const AKS_NODE_COUNT: u32 = 3;

/// Maximum pods per node
pub const AKS_MAX_PODS: u32 = 11;

/// AKS accepts 10 to 250 pods per node
pub const AKS_MAX_PODS_RANGE: std::ops::RangeInclusive<u32> = 10..=250;

/// OS disk size of each node, in GB
pub const AKS_OS_DISK_SIZE_GB: u32 = 30;

/// Expiry of the service principal password
pub const AKS_SP_PASSWORD_END_DATE: &str = "2099-01-01T00:00:00Z";

/// Admin user on the Linux nodes
pub const AKS_ADMIN_USERNAME: &str = "landfall";

/// RSA key size of the generated node SSH key
pub const AKS_SSH_KEY_BITS: u32 = 4096;

/// Engine function that returns the cluster's user kubeconfigs
pub const AKS_LIST_USER_CREDENTIALS: &str =
    "azure-native:containerservice:listManagedClusterUserCredentials";

/// Engine function that returns the caller's tenant and subscription
pub const AZURE_GET_CLIENT_CONFIG: &str = "azure-native:authorization:getClientConfig";

/// Built-in "Network Contributor" role. AKS needs it on a bring-your-own
/// subnet and its route table when the control plane uses a service principal.
pub const AZURE_NETWORK_CONTRIBUTOR_ROLE: &str = "4d97b98b-1d4f-4787-a291-c67834d212e7";
