//! Azure AKS provider
//!
//! Declares an Azure AD application with a service principal and password,
//! an SSH key for the Linux nodes, and a managed cluster with one inline
//! system agent pool. The kubeconfig is fetched with
//! `listManagedClusterUserCredentials` and decoded from base64 by the engine.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use landfall_common::{output_ref, reference, Cloud, Error, Resource, Result, Stack};
use landfall_network::NetworkTopology;

use super::{
    kubernetes_provider, public_subnet_ids, validate_common, ClusterIdentity, ClusterProvider,
    ClusterSpec, ClusterTopology,
};
use crate::constants::{
    AKS_ADMIN_USERNAME, AKS_AGENT_POOL_NAME, AKS_LIST_USER_CREDENTIALS, AKS_MAX_PODS_RANGE,
    AKS_SP_PASSWORD_END_DATE, AKS_SSH_KEY_BITS, AZURE_GET_CLIENT_CONFIG,
    AZURE_NETWORK_CONTRIBUTOR_ROLE,
};

/// Azure AKS cluster provider
#[derive(Clone, Debug, Default)]
pub struct AksProvider;

impl AksProvider {
    /// Create a new AKS provider
    pub fn new() -> Self {
        Self
    }

    /// Network Contributor for the service principal on `scope`
    fn network_contributor(
        name: String,
        principal: &Resource,
        scope: String,
        role_definition: &str,
    ) -> Resource {
        Resource::new(name, "azure-native:authorization:RoleAssignment")
            .with_properties(json!({
                "principalId": principal.output("objectId"),
                "principalType": "ServicePrincipal",
                "roleDefinitionId": role_definition,
                "scope": scope,
            }))
            .with_parent(&principal.name)
    }

    fn agent_pool(spec: &ClusterSpec, subnet_id: &str) -> Value {
        let pool = &spec.node_pool;
        let mut profile = json!({
            "name": AKS_AGENT_POOL_NAME,
            "count": pool.scaling.desired,
            "mode": "System",
            "nodeLabels": {},
            "osType": "Linux",
            "type": "VirtualMachineScaleSets",
            "vmSize": pool.instance_type,
            "vnetSubnetID": subnet_id,
        });
        if let Some(max_pods) = pool.max_pods {
            profile["maxPods"] = json!(max_pods);
        }
        if let Some(disk) = pool.os_disk_size_gb {
            profile["osDiskSizeGB"] = json!(disk);
        }
        if pool.scaling.autoscales() {
            profile["enableAutoScaling"] = json!(true);
            profile["minCount"] = json!(pool.scaling.min);
            profile["maxCount"] = json!(pool.scaling.max);
        }
        profile
    }
}

#[async_trait]
impl ClusterProvider for AksProvider {
    fn cloud(&self) -> Cloud {
        Cloud::Azure
    }

    async fn validate_spec(&self, spec: &ClusterSpec) -> Result<()> {
        validate_common(spec)?;
        if let Some(max_pods) = spec.node_pool.max_pods {
            if !AKS_MAX_PODS_RANGE.contains(&max_pods) {
                return Err(Error::validation_for_field(
                    &spec.name,
                    "maxPods",
                    format!(
                        "{} is outside the supported range {}..={}",
                        max_pods,
                        AKS_MAX_PODS_RANGE.start(),
                        AKS_MAX_PODS_RANGE.end()
                    ),
                ));
            }
        }
        Ok(())
    }

    async fn declare(
        &self,
        spec: &ClusterSpec,
        network: &NetworkTopology,
        stack: &mut Stack,
    ) -> Result<ClusterTopology> {
        self.validate_spec(spec).await?;
        let resource_group = network.resource_group_name().ok_or_else(|| {
            Error::provider(
                Cloud::Azure.to_string(),
                format!("network {} has no resource group", network.network),
            )
        })?;
        let subnet_ids = public_subnet_ids(Cloud::Azure, network)?;

        let app_name = format!("{}-aks", spec.name);
        let application = Resource::new(&app_name, "azuread:index:Application")
            .with_properties(json!({ "displayName": app_name }));

        let principal = Resource::new(format!("{}-sp", app_name), "azuread:index:ServicePrincipal")
            .with_properties(json!({ "clientId": application.output("clientId") }));

        let password = Resource::new(
            format!("{}-sp-password", app_name),
            "azuread:index:ServicePrincipalPassword",
        )
        .with_properties(json!({
            "servicePrincipalId": principal.id_ref(),
            "endDate": AKS_SP_PASSWORD_END_DATE,
        }))
        .with_secret_outputs(&["value"]);

        let ssh_key = Resource::new(format!("{}-ssh-key", spec.name), "tls:index:PrivateKey")
            .with_properties(json!({
                "algorithm": "RSA",
                "rsaBits": AKS_SSH_KEY_BITS,
            }));

        let client_config = format!("{}-client-config", spec.name);
        let client_config_invoke = json!({
            "fn::invoke": {
                "function": AZURE_GET_CLIENT_CONFIG,
                "arguments": {},
                "return": "subscriptionId",
            }
        });
        let role_definition = format!(
            "/subscriptions/{}/providers/Microsoft.Authorization/roleDefinitions/{}",
            reference(&client_config),
            AZURE_NETWORK_CONTRIBUTOR_ROLE
        );
        // The node pool lives in the first public subnet, which routes through
        // the shared route table
        let node_subnet = &network.public_subnets[0];
        let assignments = [
            Self::network_contributor(
                format!("{}-subnet-network-contributor", principal.name),
                &principal,
                output_ref(node_subnet, "id"),
                &role_definition,
            ),
            Self::network_contributor(
                format!("{}-route-table-network-contributor", principal.name),
                &principal,
                output_ref(&network.route_table, "id"),
                &role_definition,
            ),
        ];

        let cluster_name = format!("{}-cluster", spec.name);
        let mut properties = json!({
            "resourceGroupName": resource_group,
            "agentPoolProfiles": [Self::agent_pool(spec, &subnet_ids[0])],
            "enableRBAC": true,
            "kubernetesVersion": spec.kubernetes_version,
            "linuxProfile": {
                "adminUsername": AKS_ADMIN_USERNAME,
                "ssh": {
                    "publicKeys": [{ "keyData": ssh_key.output("publicKeyOpenssh") }],
                },
            },
            "dnsPrefix": resource_group,
            "nodeResourceGroup": format!("{}-node-rg", cluster_name),
            "servicePrincipalProfile": {
                "clientId": application.output("clientId"),
                "secret": password.output("value"),
            },
            "tags": { "Owner": spec.owner },
        });
        if let Some(location) = &spec.location {
            properties["location"] = json!(location);
        }
        let cluster = assignments.iter().fold(
            Resource::new(&cluster_name, "azure-native:containerservice:ManagedCluster")
                .with_properties(properties),
            |cluster, assignment| cluster.with_depends_on(&assignment.name),
        );

        let credentials = format!("{}-credentials", cluster_name);
        let kubeconfig = format!("{}-kubeconfig", spec.name);
        let provider = kubernetes_provider(spec, &kubeconfig, &cluster.name);

        let topology = ClusterTopology {
            cloud: Cloud::Azure,
            identity: ClusterIdentity {
                role: principal.name.clone(),
                grants: assignments.iter().map(|a| a.name.clone()).collect(),
            },
            control_plane: cluster.name.clone(),
            node_pool: cluster.name.clone(),
            scaling: spec.node_pool.scaling,
            kubeconfig: kubeconfig.clone(),
            k8s_provider: provider.name.clone(),
        };

        let credentials_invoke = json!({
            "fn::invoke": {
                "function": AKS_LIST_USER_CREDENTIALS,
                "arguments": {
                    "resourceGroupName": resource_group,
                    "resourceName": cluster.output("name"),
                },
                "return": "kubeconfigs",
            }
        });
        let decoded = json!({
            "fn::fromBase64": output_ref(&format!("{}[0]", credentials), "value"),
        });

        stack.add_resource(application)?;
        stack.add_resource(principal)?;
        stack.add_resource(password)?;
        stack.add_resource(ssh_key)?;
        stack.add_variable(&client_config, client_config_invoke)?;
        for assignment in assignments {
            stack.add_resource(assignment)?;
        }
        stack.add_resource(cluster)?;
        stack.add_secret_variable(&credentials, credentials_invoke)?;
        stack.add_secret_variable(&kubeconfig, decoded)?;
        stack.add_resource(provider)?;

        info!(
            cluster = %topology.control_plane,
            version = %spec.kubernetes_version,
            vm_size = %spec.node_pool.instance_type,
            "declared AKS cluster"
        );
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::network;
    use crate::provider::NodePoolScaling;

    async fn declare(spec: ClusterSpec) -> (Stack, ClusterTopology) {
        let mut stack = Stack::new("test");
        let net = network(Cloud::Azure, "aks-helm", &mut stack);
        let topology = AksProvider::new()
            .declare(&spec, &net, &mut stack)
            .await
            .expect("declare should succeed");
        (stack, topology)
    }

    #[tokio::test]
    async fn declares_identity_chain() {
        let (stack, topology) =
            declare(ClusterSpec::defaults(Cloud::Azure, "aks-helm")).await;
        assert_eq!(topology.identity.role, "aks-helm-aks-sp");

        let password = stack.resource("aks-helm-aks-sp-password").expect("password");
        assert_eq!(password.properties["endDate"], "2099-01-01T00:00:00Z");
        assert_eq!(password.options.additional_secret_outputs, vec!["value"]);

        let key = stack.resource("aks-helm-ssh-key").expect("ssh key");
        assert_eq!(key.properties["rsaBits"], 4096);
    }

    #[tokio::test]
    async fn managed_cluster_matches_defaults() {
        let (stack, _) = declare(ClusterSpec::defaults(Cloud::Azure, "aks-helm")).await;
        let cluster = stack.resource("aks-helm-cluster").expect("cluster");
        let props = &cluster.properties;
        assert_eq!(props["kubernetesVersion"], "1.29.2");
        assert_eq!(props["enableRBAC"], true);
        assert_eq!(props["dnsPrefix"], "${aks-helm-rg.name}");
        assert_eq!(props["nodeResourceGroup"], "aks-helm-cluster-node-rg");
        assert_eq!(
            props["servicePrincipalProfile"]["secret"],
            "${aks-helm-aks-sp-password.value}"
        );

        let pool = &props["agentPoolProfiles"][0];
        assert_eq!(pool["name"], "agentpool");
        assert_eq!(pool["count"], 3);
        assert_eq!(pool["maxPods"], 11);
        assert_eq!(pool["osDiskSizeGB"], 30);
        assert_eq!(pool["vmSize"], "Standard_DS2_v2");
        assert_eq!(pool["mode"], "System");
        assert_eq!(pool["vnetSubnetID"], "${aks-helm-subnet-public-1.id}");
        assert!(pool.get("enableAutoScaling").is_none());
    }

    #[tokio::test]
    async fn service_principal_gets_network_contributor_on_node_network() {
        let (stack, topology) =
            declare(ClusterSpec::defaults(Cloud::Azure, "aks-helm")).await;
        let subnet = "aks-helm-aks-sp-subnet-network-contributor";
        let route_table = "aks-helm-aks-sp-route-table-network-contributor";
        assert_eq!(topology.identity.grants, vec![subnet, route_table]);

        for (name, scope) in [
            (subnet, "${aks-helm-subnet-public-1.id}"),
            (route_table, "${aks-helm-rt-public.id}"),
        ] {
            let assignment = stack.resource(name).expect("role assignment");
            assert_eq!(assignment.type_token, "azure-native:authorization:RoleAssignment");
            assert_eq!(assignment.properties["scope"], scope);
            assert_eq!(assignment.properties["principalId"], "${aks-helm-aks-sp.objectId}");
            assert_eq!(assignment.properties["principalType"], "ServicePrincipal");
            assert_eq!(
                assignment.properties["roleDefinitionId"],
                "/subscriptions/${aks-helm-client-config}/providers/Microsoft.Authorization\
                 /roleDefinitions/4d97b98b-1d4f-4787-a291-c67834d212e7"
            );
        }

        let cluster = stack.resource("aks-helm-cluster").expect("cluster");
        assert_eq!(cluster.options.depends_on, vec![subnet, route_table]);
        let order = stack.topological_order().expect("acyclic");
        let position = |name: &str| order.iter().position(|n| *n == name);
        assert!(position(route_table) < position("aks-helm-cluster"));
    }

    #[tokio::test]
    async fn kubeconfig_is_decoded_and_secret() {
        let (stack, topology) =
            declare(ClusterSpec::defaults(Cloud::Azure, "aks-helm")).await;
        let credentials = stack
            .variable("aks-helm-cluster-credentials")
            .expect("credentials variable");
        assert!(credentials.secret);
        assert_eq!(
            credentials.value["fn::invoke"]["function"],
            "azure-native:containerservice:listManagedClusterUserCredentials"
        );

        let kubeconfig = stack.variable(&topology.kubeconfig).expect("kubeconfig");
        assert!(kubeconfig.secret);
        assert_eq!(
            kubeconfig.value["fn::fromBase64"],
            "${aks-helm-cluster-credentials[0].value}"
        );
        stack.validate().expect("stack should validate");
    }

    #[tokio::test]
    async fn autoscaling_pool_sets_bounds() {
        let mut spec = ClusterSpec::defaults(Cloud::Azure, "aks-helm");
        spec.node_pool.scaling = NodePoolScaling { min: 1, desired: 2, max: 5 };
        let (stack, _) = declare(spec).await;
        let pool = &stack.resource("aks-helm-cluster").expect("cluster").properties
            ["agentPoolProfiles"][0];
        assert_eq!(pool["enableAutoScaling"], true);
        assert_eq!(pool["minCount"], 1);
        assert_eq!(pool["maxCount"], 5);
        assert_eq!(pool["count"], 2);
    }

    #[tokio::test]
    async fn out_of_range_max_pods_is_rejected() {
        let mut spec = ClusterSpec::defaults(Cloud::Azure, "aks-helm");
        spec.node_pool.max_pods = Some(5);
        let err = AksProvider::new().validate_spec(&spec).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn requires_resource_group() {
        let mut stack = Stack::new("test");
        let net = crate::provider::test_support::network(Cloud::Aws, "aks-helm", &mut stack);
        let err = AksProvider::new()
            .declare(&ClusterSpec::defaults(Cloud::Azure, "aks-helm"), &net, &mut stack)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
