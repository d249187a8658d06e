//! Cluster credential handling
//!
//! Stack outputs carry the kubeconfig either as plain YAML/JSON, as a JSON
//! string literal (`pulumi stack output --json`), or in base64 transport
//! encoding. [`decode_kubeconfig`] accepts all three and checks that the
//! result is a usable kubeconfig.
//!
//! Every buffer holding kubeconfig text is a [`Zeroizing`] so plaintext copies
//! are cleared on drop. Nothing here logs or formats kubeconfig contents;
//! errors only describe the shape of the problem.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use kube::config::Kubeconfig;
use tracing::debug;
use zeroize::Zeroizing;

use landfall_common::{Error, Result};

/// A validated kubeconfig
#[derive(Clone)]
pub struct ClusterCredential {
    /// Kubeconfig document (zeroized on drop)
    kubeconfig: Zeroizing<String>,
    current_context: Option<String>,
    servers: Vec<String>,
}

impl fmt::Debug for ClusterCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCredential")
            .field("kubeconfig", &"[REDACTED]")
            .field("current_context", &self.current_context)
            .field("servers", &self.servers)
            .finish()
    }
}

impl ClusterCredential {
    /// The kubeconfig document
    pub fn kubeconfig(&self) -> &Zeroizing<String> {
        &self.kubeconfig
    }

    /// Context selected by the kubeconfig, if any
    pub fn current_context(&self) -> Option<&str> {
        self.current_context.as_deref()
    }

    /// API server URLs of every cluster entry
    pub fn servers(&self) -> &[String] {
        &self.servers
    }
}

/// Decode and validate an exported kubeconfig
pub fn decode_kubeconfig(raw: &str) -> Result<ClusterCredential> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::credential("kubeconfig is empty"));
    }

    let unquoted = if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed)
            .map(Zeroizing::new)
            .map_err(|_| Error::credential("kubeconfig is a malformed JSON string"))?
    } else {
        Zeroizing::new(trimmed.to_string())
    };

    match parse(&unquoted) {
        Ok(credential) => Ok(credential),
        Err(plain_err) => {
            let compact: Zeroizing<String> =
                Zeroizing::new(unquoted.split_whitespace().collect());
            let Ok(bytes) = STANDARD.decode(compact.as_bytes()).map(Zeroizing::new) else {
                return Err(plain_err);
            };
            debug!("kubeconfig used base64 transport encoding");
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| Error::credential("decoded kubeconfig is not valid UTF-8"))?;
            parse(text)
        }
    }
}

fn parse(text: &str) -> Result<ClusterCredential> {
    // serde_yaml errors can quote the input, so only the location is kept
    let kubeconfig: Kubeconfig = serde_yaml::from_str(text).map_err(|e| {
        let at = e
            .location()
            .map(|l| format!(" at line {} column {}", l.line(), l.column()))
            .unwrap_or_default();
        Error::credential(format!("kubeconfig is not a valid document{}", at))
    })?;

    if kubeconfig.clusters.is_empty() {
        return Err(Error::credential("kubeconfig has no clusters"));
    }
    let mut servers = Vec::with_capacity(kubeconfig.clusters.len());
    for named in &kubeconfig.clusters {
        let server = named
            .cluster
            .as_ref()
            .and_then(|c| c.server.clone())
            .ok_or_else(|| {
                Error::credential(format!("cluster entry '{}' has no server", named.name))
            })?;
        servers.push(server);
    }
    if let Some(current) = &kubeconfig.current_context {
        if !kubeconfig.contexts.iter().any(|c| &c.name == current) {
            return Err(Error::credential(format!(
                "current context '{}' is not defined",
                current
            )));
        }
    }

    Ok(ClusterCredential {
        kubeconfig: Zeroizing::new(text.to_string()),
        current_context: kubeconfig.current_context,
        servers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: aks-helm-cluster
  cluster:
    server: https://aks-helm-1a2b3c.hcp.westeurope.azmk8s.io:443
    certificate-authority-data: Y2VydA==
contexts:
- name: aks-helm-cluster
  context:
    cluster: aks-helm-cluster
    user: clusterUser
current-context: aks-helm-cluster
users:
- name: clusterUser
  user:
    token: super-secret-token
"#;

    #[test]
    fn accepts_plain_yaml() {
        let credential = decode_kubeconfig(KUBECONFIG).expect("valid kubeconfig");
        assert_eq!(credential.current_context(), Some("aks-helm-cluster"));
        assert_eq!(
            credential.servers(),
            ["https://aks-helm-1a2b3c.hcp.westeurope.azmk8s.io:443"]
        );
    }

    #[test]
    fn accepts_base64_transport_encoding() {
        let encoded = STANDARD.encode(KUBECONFIG);
        let credential = decode_kubeconfig(&encoded).expect("valid kubeconfig");
        assert_eq!(credential.kubeconfig().as_str(), KUBECONFIG);
    }

    #[test]
    fn accepts_json_string_output() {
        let quoted = serde_json::to_string(KUBECONFIG).expect("quote");
        let credential = decode_kubeconfig(&quoted).expect("valid kubeconfig");
        assert_eq!(credential.servers().len(), 1);
    }

    #[test]
    fn accepts_json_kubeconfig() {
        let json = r#"{"apiVersion":"v1","kind":"Config","clusters":[{"name":"eks","cluster":{"server":"https://example.eks.amazonaws.com"}}],"contexts":[{"name":"aws","context":{"cluster":"eks","user":"aws"}}],"current-context":"aws","users":[{"name":"aws","user":{"exec":{"apiVersion":"client.authentication.k8s.io/v1beta1","command":"aws","args":["eks","get-token"]}}}]}"#;
        let credential = decode_kubeconfig(json).expect("valid kubeconfig");
        assert_eq!(credential.current_context(), Some("aws"));
    }

    #[test]
    fn debug_output_is_redacted() {
        let credential = decode_kubeconfig(KUBECONFIG).expect("valid kubeconfig");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn kubeconfig_is_cleared_on_drop() {
        fn clears_on_drop<T: zeroize::ZeroizeOnDrop>(_: &T) {}
        let credential = decode_kubeconfig(KUBECONFIG).expect("valid kubeconfig");
        clears_on_drop(credential.kubeconfig());
    }

    #[test]
    fn rejects_config_without_clusters() {
        let err = decode_kubeconfig("apiVersion: v1\nkind: Config\nclusters: []\n").unwrap_err();
        assert!(err.to_string().contains("no clusters"));
    }

    #[test]
    fn rejects_dangling_current_context() {
        let broken = KUBECONFIG.replace("current-context: aks-helm-cluster", "current-context: other");
        let err = decode_kubeconfig(&broken).unwrap_err();
        assert!(err.to_string().contains("'other'"));
    }

    #[test]
    fn errors_never_echo_contents() {
        let err = decode_kubeconfig("token: [super-secret-token").unwrap_err();
        assert!(!err.to_string().contains("super-secret-token"));
        assert!(decode_kubeconfig("   ").is_err());
    }
}
