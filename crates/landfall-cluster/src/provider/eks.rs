//! AWS EKS provider
//!
//! Declares an IAM role for the cluster and its nodes, a cluster security
//! group, an `eks:index:Cluster` with the default node group skipped, and a
//! managed node group. The kubeconfig is taken from the cluster's
//! `kubeconfigJson` output and kept secret.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use landfall_common::{Cloud, Resource, Result, Stack};
use landfall_network::NetworkTopology;

use super::{
    kubernetes_provider, public_subnet_ids, validate_common, ClusterIdentity, ClusterProvider,
    ClusterSpec, ClusterTopology,
};
use crate::constants::{
    EKS_CLUSTER_LOG_TYPES, EKS_MANAGED_POLICY_ARNS, EKS_ROLE_TRUSTED_SERVICE, EKS_STORAGE_CLASS,
    NODE_POOL_CREATE_TIMEOUT,
};

/// AWS EKS cluster provider
#[derive(Clone, Debug, Default)]
pub struct EksProvider;

impl EksProvider {
    /// Create a new EKS provider
    pub fn new() -> Self {
        Self
    }

    fn owner_tags(spec: &ClusterSpec) -> BTreeMap<&'static str, String> {
        BTreeMap::from([("Owner", spec.owner.clone())])
    }

    /// IAM role plus one attachment per managed policy
    fn declare_identity(spec: &ClusterSpec) -> (Resource, Vec<Resource>) {
        let role = Resource::new(format!("{}-eks-iam-role", spec.name), "aws:iam:Role")
            .with_properties(json!({
                "assumeRolePolicy": {
                    "fn::toJSON": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Action": "sts:AssumeRole",
                            "Principal": { "Service": EKS_ROLE_TRUSTED_SERVICE },
                            "Effect": "Allow",
                            "Sid": "",
                        }],
                    },
                },
                "tags": Self::owner_tags(spec),
            }));

        let attachments = EKS_MANAGED_POLICY_ARNS
            .iter()
            .enumerate()
            .map(|(i, arn)| {
                Resource::new(
                    format!("{}-policy-{}", role.name, i),
                    "aws:iam:RolePolicyAttachment",
                )
                .with_properties(json!({
                    "policyArn": arn,
                    "role": role.id_ref(),
                }))
                .with_parent(&role.name)
            })
            .collect();

        (role, attachments)
    }

    fn declare_security_group(spec: &ClusterSpec, network: &NetworkTopology) -> Resource {
        let sources = spec.policy.cluster_sources(&network.block);
        Resource::new(format!("{}-eks-cluster-sg", spec.name), "aws:ec2:SecurityGroup")
            .with_properties(json!({
                "vpcId": network.network_id(),
                "description": "HTTP(S) access to the EKS cluster",
                "ingress": [
                    {
                        "cidrBlocks": sources,
                        "fromPort": 443,
                        "toPort": 443,
                        "protocol": "tcp",
                        "description": "Cluster API server",
                    },
                    {
                        "cidrBlocks": sources,
                        "fromPort": 80,
                        "toPort": 80,
                        "protocol": "tcp",
                        "description": "HTTP to workloads",
                    },
                ],
                "tags": Self::owner_tags(spec),
            }))
    }
}

#[async_trait]
impl ClusterProvider for EksProvider {
    fn cloud(&self) -> Cloud {
        Cloud::Aws
    }

    async fn validate_spec(&self, spec: &ClusterSpec) -> Result<()> {
        validate_common(spec)
    }

    async fn declare(
        &self,
        spec: &ClusterSpec,
        network: &NetworkTopology,
        stack: &mut Stack,
    ) -> Result<ClusterTopology> {
        self.validate_spec(spec).await?;
        let subnet_ids = public_subnet_ids(Cloud::Aws, network)?;

        let (role, attachments) = Self::declare_identity(spec);
        let security_group = Self::declare_security_group(spec, network);

        let cluster = Resource::new(format!("{}-eks-cluster", spec.name), "eks:index:Cluster")
            .with_properties(json!({
                "vpcId": network.network_id(),
                "subnetIds": subnet_ids,
                "clusterSecurityGroup": security_group.reference(),
                "createOidcProvider": true,
                "storageClasses": EKS_STORAGE_CLASS,
                "instanceRoles": [role.reference()],
                "version": spec.kubernetes_version,
                "enabledClusterLogTypes": EKS_CLUSTER_LOG_TYPES,
                "skipDefaultNodeGroup": true,
                "tags": Self::owner_tags(spec),
            }))
            .with_depends_on(&role.name)
            .with_secret_outputs(&["kubeconfig", "kubeconfigJson"]);

        let scaling = spec.node_pool.scaling;
        let node_group = Resource::new(
            format!("{}-eks-managed-node-group", spec.name),
            "eks:index:ManagedNodeGroup",
        )
        .with_properties(json!({
            "cluster": cluster.reference(),
            "instanceTypes": [spec.node_pool.instance_type],
            "nodeRole": role.reference(),
            "subnetIds": subnet_ids,
            "scalingConfig": {
                "desiredSize": scaling.desired,
                "maxSize": scaling.max,
                "minSize": scaling.min,
            },
            "tags": Self::owner_tags(spec),
        }))
        .with_parent(&cluster.name)
        .with_create_timeout(NODE_POOL_CREATE_TIMEOUT);

        let kubeconfig = format!("{}-kubeconfig", spec.name);
        let provider = kubernetes_provider(spec, &kubeconfig, &cluster.name);

        let topology = ClusterTopology {
            cloud: Cloud::Aws,
            identity: ClusterIdentity {
                role: role.name.clone(),
                grants: attachments.iter().map(|a| a.name.clone()).collect(),
            },
            control_plane: cluster.name.clone(),
            node_pool: node_group.name.clone(),
            scaling,
            kubeconfig: kubeconfig.clone(),
            k8s_provider: provider.name.clone(),
        };

        let kubeconfig_json = cluster.output("kubeconfigJson");
        stack.add_resource(role)?;
        for attachment in attachments {
            stack.add_resource(attachment)?;
        }
        stack.add_resource(security_group)?;
        stack.add_resource(cluster)?;
        stack.add_resource(node_group)?;
        stack.add_secret_variable(&kubeconfig, json!(kubeconfig_json))?;
        stack.add_resource(provider)?;

        info!(
            cluster = %topology.control_plane,
            version = %spec.kubernetes_version,
            instance_type = %spec.node_pool.instance_type,
            "declared EKS cluster"
        );
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::network;
    use crate::provider::NodePoolScaling;
    use std::time::Duration;

    async fn declare_default() -> (Stack, ClusterTopology) {
        let mut stack = Stack::new("test");
        let net = network(Cloud::Aws, "eks-helm", &mut stack);
        let topology = EksProvider::new()
            .declare(&ClusterSpec::defaults(Cloud::Aws, "eks-helm"), &net, &mut stack)
            .await
            .expect("declare should succeed");
        (stack, topology)
    }

    #[tokio::test]
    async fn declares_identity_with_four_grants() {
        let (stack, topology) = declare_default().await;
        assert_eq!(topology.identity.role, "eks-helm-eks-iam-role");
        assert_eq!(
            topology.identity.grants,
            (0..4)
                .map(|i| format!("eks-helm-eks-iam-role-policy-{i}"))
                .collect::<Vec<_>>()
        );
        let role = stack.resource("eks-helm-eks-iam-role").expect("role");
        let statement = &role.properties["assumeRolePolicy"]["fn::toJSON"]["Statement"][0];
        assert_eq!(statement["Principal"]["Service"], "ec2.amazonaws.com");
        assert_eq!(statement["Action"], "sts:AssumeRole");

        let first = stack
            .resource("eks-helm-eks-iam-role-policy-0")
            .expect("attachment");
        assert_eq!(
            first.properties["policyArn"],
            "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy"
        );
        assert_eq!(first.options.parent.as_deref(), Some("eks-helm-eks-iam-role"));
    }

    #[tokio::test]
    async fn cluster_matches_defaults() {
        let (stack, _) = declare_default().await;
        let cluster = stack.resource("eks-helm-eks-cluster").expect("cluster");
        let props = &cluster.properties;
        assert_eq!(cluster.type_token, "eks:index:Cluster");
        assert_eq!(props["version"], "1.30");
        assert_eq!(props["storageClasses"], "gp2");
        assert_eq!(props["createOidcProvider"], true);
        assert_eq!(props["skipDefaultNodeGroup"], true);
        assert_eq!(props["enabledClusterLogTypes"].as_array().map(Vec::len), Some(5));
        assert_eq!(props["subnetIds"][0], "${eks-helm-subnet-public-us-west-2a.id}");
        assert_eq!(props["clusterSecurityGroup"], "${eks-helm-eks-cluster-sg}");
        assert_eq!(cluster.options.depends_on, vec!["eks-helm-eks-iam-role"]);
    }

    #[tokio::test]
    async fn node_group_has_timeout_and_scaling() {
        let (stack, topology) = declare_default().await;
        let group = stack
            .resource("eks-helm-eks-managed-node-group")
            .expect("node group");
        assert_eq!(group.options.parent.as_deref(), Some("eks-helm-eks-cluster"));
        assert_eq!(
            group
                .options
                .custom_timeouts
                .as_ref()
                .and_then(|t| t.create),
            Some(Duration::from_secs(600))
        );
        let scaling = &group.properties["scalingConfig"];
        assert_eq!(scaling["minSize"], 1);
        assert_eq!(scaling["desiredSize"], 2);
        assert_eq!(scaling["maxSize"], 2);
        assert_eq!(group.properties["instanceTypes"][0], "t3.medium");
        assert_eq!(
            topology.scaling,
            NodePoolScaling { min: 1, desired: 2, max: 2 }
        );
    }

    #[tokio::test]
    async fn kubeconfig_is_secret_and_bound_to_provider() {
        let (stack, topology) = declare_default().await;
        let variable = stack.variable(&topology.kubeconfig).expect("kubeconfig variable");
        assert!(variable.secret);
        assert_eq!(variable.value, "${eks-helm-eks-cluster.kubeconfigJson}");

        let provider = stack.resource(&topology.k8s_provider).expect("provider");
        assert_eq!(provider.type_token, "pulumi:providers:kubernetes");
        assert_eq!(provider.properties["kubeconfig"], "${eks-helm-kubeconfig}");
        stack.validate().expect("stack should validate");
    }

    #[tokio::test]
    async fn cluster_ingress_defaults_to_vpc_block() {
        let (stack, _) = declare_default().await;
        let sg = stack.resource("eks-helm-eks-cluster-sg").expect("sg");
        for rule in sg.properties["ingress"].as_array().expect("rules") {
            assert_eq!(rule["cidrBlocks"], json!(["10.255.0.0/16"]));
        }
    }

    #[tokio::test]
    async fn invalid_scaling_declares_nothing() {
        let mut stack = Stack::new("test");
        let net = network(Cloud::Aws, "eks-helm", &mut stack);
        let before = stack.resources().len();
        let mut spec = ClusterSpec::defaults(Cloud::Aws, "eks-helm");
        spec.node_pool.scaling = NodePoolScaling { min: 3, desired: 2, max: 2 };
        assert!(EksProvider::new().declare(&spec, &net, &mut stack).await.is_err());
        assert_eq!(stack.resources().len(), before);
    }
}
