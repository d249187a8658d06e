//! Managed Kubernetes clusters for landfall stacks
//!
//! The [`ClusterProvider`] trait declares a cluster on top of a landing zone,
//! with EKS and AKS implementations. [`credential`] decodes the kubeconfig a
//! deployed stack exports.

pub mod constants;
pub mod credential;
pub mod provider;

pub use credential::{decode_kubeconfig, ClusterCredential};
pub use provider::{
    create_provider, AksProvider, ClusterIdentity, ClusterProvider, ClusterSpec, ClusterTopology,
    EksProvider, NodePoolScaling, NodePoolSpec,
};
