//! Resource declarations
//!
//! A [`Resource`] is one desired-state object handed to the provisioning
//! engine: a logical name, a type token (e.g. `aws:ec2:Vpc`), its input
//! properties, and the options that place it in the dependency graph.
//! Properties refer to other resources through `${name.path}`
//! interpolations, which the engine resolves after the referenced resource
//! exists.

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::Value;

use crate::{output_ref, reference};

/// Per-operation timeouts the engine applies to a resource
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomTimeouts {
    /// Create timeout
    pub create: Option<Duration>,
    /// Update timeout
    pub update: Option<Duration>,
    /// Delete timeout
    pub delete: Option<Duration>,
}

impl CustomTimeouts {
    /// Timeouts with only a create deadline
    pub fn create(timeout: Duration) -> Self {
        Self {
            create: Some(timeout),
            ..Default::default()
        }
    }
}

/// Format a duration the way the engine expects (`10m`, `1h`, `45s`)
pub fn format_timeout(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Graph placement options for a resource
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Logical parent, used for grouping in the engine's resource tree
    pub parent: Option<String>,
    /// Resources that must be realised before this one
    pub depends_on: Vec<String>,
    /// Resource whose deletion also removes this one without a separate delete call
    pub deleted_with: Option<String>,
    /// Explicit provider resource (e.g. a Kubernetes provider for a given cluster)
    pub provider: Option<String>,
    /// Operation timeouts
    pub custom_timeouts: Option<CustomTimeouts>,
    /// Output properties the engine must store encrypted
    pub additional_secret_outputs: Vec<String>,
}

impl ResourceOptions {
    /// Every resource name these options point at
    pub fn references(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.depends_on.iter().cloned().collect();
        names.extend(self.parent.iter().cloned());
        names.extend(self.deleted_with.iter().cloned());
        names.extend(self.provider.iter().cloned());
        names
    }
}

/// A single desired-state resource declaration
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    /// Logical name, unique within a stack
    pub name: String,
    /// Engine type token (`package:module:Type`)
    pub type_token: String,
    /// Input properties
    pub properties: Value,
    /// Lookup of an existing object instead of creating one
    pub get: Option<Value>,
    /// Graph options
    pub options: ResourceOptions,
}

impl Resource {
    /// Declare a resource with no properties
    pub fn new(name: impl Into<String>, type_token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_token: type_token.into(),
            properties: Value::Object(Default::default()),
            get: None,
            options: ResourceOptions::default(),
        }
    }

    /// Declare a read of an existing object identified by `id`
    pub fn lookup(
        name: impl Into<String>,
        type_token: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let mut resource = Self::new(name, type_token);
        resource.get = Some(serde_json::json!({ "id": id.into() }));
        resource
    }

    /// Set the input properties
    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }

    /// Set the logical parent
    pub fn with_parent(mut self, parent: &str) -> Self {
        self.options.parent = Some(parent.to_string());
        self
    }

    /// Add an explicit dependency
    pub fn with_depends_on(mut self, dependency: &str) -> Self {
        if !self.options.depends_on.iter().any(|d| d == dependency) {
            self.options.depends_on.push(dependency.to_string());
        }
        self
    }

    /// Delete this resource together with `owner`
    pub fn with_deleted_with(mut self, owner: &str) -> Self {
        self.options.deleted_with = Some(owner.to_string());
        self
    }

    /// Use an explicit provider resource
    pub fn with_provider(mut self, provider: &str) -> Self {
        self.options.provider = Some(provider.to_string());
        self
    }

    /// Extend the create timeout
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.options.custom_timeouts = Some(CustomTimeouts::create(timeout));
        self
    }

    /// Mark output properties as secret
    pub fn with_secret_outputs(mut self, outputs: &[&str]) -> Self {
        self.options
            .additional_secret_outputs
            .extend(outputs.iter().map(|o| o.to_string()));
        self
    }

    /// `${name}`
    pub fn reference(&self) -> String {
        reference(&self.name)
    }

    /// `${name.id}`
    pub fn id_ref(&self) -> String {
        output_ref(&self.name, "id")
    }

    /// `${name.<path>}`
    pub fn output(&self, path: &str) -> String {
        output_ref(&self.name, path)
    }

    /// Names referenced through options, properties and the lookup id
    pub fn references(&self) -> BTreeSet<String> {
        let mut names = self.options.references();
        collect_references(&self.properties, &mut names);
        if let Some(get) = &self.get {
            collect_references(get, &mut names);
        }
        names
    }
}

/// Collect the head names of every `${...}` interpolation inside `value`.
///
/// `$${` is the engine's escape for a literal `${` and is skipped.
pub fn collect_references(value: &Value, names: &mut BTreeSet<String>) {
    visit_interpolations(value, &mut |inner| {
        let (head, _) = split_interpolation(inner);
        if !head.is_empty() {
            names.insert(head.to_string());
        }
    });
}

/// Collect the full text of every `${...}` interpolation inside `value`,
/// e.g. `cluster.kubeconfigJson` or `creds[0].value`
pub fn collect_interpolations(value: &Value, paths: &mut BTreeSet<String>) {
    visit_interpolations(value, &mut |inner| {
        paths.insert(inner.trim().to_string());
    });
}

/// Split an interpolation into its head name and the first property it
/// reads: `cluster.kubeconfigJson` gives `("cluster", Some("kubeconfigJson"))`
pub fn split_interpolation(inner: &str) -> (&str, Option<&str>) {
    let inner = inner.trim();
    let head_end = inner.find(['.', '[']).unwrap_or(inner.len());
    let head = &inner[..head_end];
    let property = inner[head_end..]
        .strip_prefix('.')
        .and_then(|rest| rest.split(['.', '[']).next())
        .filter(|p| !p.is_empty());
    (head, property)
}

fn visit_interpolations(value: &Value, visit: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => visit_str(s, visit),
        Value::Array(items) => items.iter().for_each(|v| visit_interpolations(v, visit)),
        Value::Object(map) => {
            for (key, v) in map {
                visit_str(key, visit);
                visit_interpolations(v, visit);
            }
        }
        _ => {}
    }
}

fn visit_str(s: &str, visit: &mut impl FnMut(&str)) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'$' {
            i += 2;
            continue;
        }
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            let start = i + 2;
            let Some(len) = s[start..].find('}') else {
                return;
            };
            visit(&s[start..start + len]);
            i = start + len + 1;
            continue;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_options() {
        let resource = Resource::new("node-group", "eks:index:ManagedNodeGroup")
            .with_parent("cluster")
            .with_depends_on("role")
            .with_depends_on("role")
            .with_provider("aws-east")
            .with_create_timeout(Duration::from_secs(600));

        assert_eq!(resource.options.parent.as_deref(), Some("cluster"));
        assert_eq!(resource.options.depends_on, vec!["role".to_string()]);
        assert_eq!(
            resource.options.custom_timeouts,
            Some(CustomTimeouts::create(Duration::from_secs(600)))
        );
    }

    #[test]
    fn references_include_options_and_interpolations() {
        let resource = Resource::new("subnet", "aws:ec2:Subnet")
            .with_properties(json!({
                "vpcId": "${vpc.id}",
                "tags": { "Name": "subnet" },
                "routes": [{ "gatewayId": "${igw.id}" }],
                "list": "${zones.names[0]}"
            }))
            .with_parent("vpc")
            .with_deleted_with("cluster");

        let refs = resource.references();
        let expected: BTreeSet<String> = ["vpc", "igw", "zones", "cluster"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(refs, expected);
    }

    #[test]
    fn escaped_interpolations_are_ignored() {
        let mut names = BTreeSet::new();
        collect_references(&json!("literal $${not.a.ref} and ${real}"), &mut names);
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["real"]);
    }

    #[test]
    fn unterminated_interpolation_is_ignored() {
        let mut names = BTreeSet::new();
        collect_references(&json!("${broken"), &mut names);
        assert!(names.is_empty());
    }

    #[test]
    fn lookup_references_its_id() {
        let svc = Resource::lookup(
            "svc",
            "kubernetes:core/v1:Service",
            "${ns.metadata.name}/apache",
        );
        assert!(svc.references().contains("ns"));
    }

    #[test]
    fn interpolations_split_into_head_and_property() {
        assert_eq!(
            split_interpolation("cluster.kubeconfigJson"),
            ("cluster", Some("kubeconfigJson"))
        );
        assert_eq!(
            split_interpolation("svc.status.loadBalancer"),
            ("svc", Some("status"))
        );
        assert_eq!(split_interpolation("creds[0].value"), ("creds", None));
        assert_eq!(split_interpolation("kubeconfig"), ("kubeconfig", None));
    }

    #[test]
    fn timeouts_format_in_largest_unit() {
        assert_eq!(format_timeout(Duration::from_secs(600)), "10m");
        assert_eq!(format_timeout(Duration::from_secs(7200)), "2h");
        assert_eq!(format_timeout(Duration::from_secs(45)), "45s");
        assert_eq!(format_timeout(Duration::ZERO), "0s");
    }

    #[test]
    fn output_helpers_interpolate_name() {
        let vpc = Resource::new("eks-helm-vpc", "aws:ec2:Vpc");
        assert_eq!(vpc.id_ref(), "${eks-helm-vpc.id}");
        assert_eq!(vpc.reference(), "${eks-helm-vpc}");
        assert_eq!(vpc.output("arn"), "${eks-helm-vpc.arn}");
    }
}
