//! `landfall kubeconfig` - turn an exported cluster credential into a kubeconfig
//!
//! Accepts the `kubeconfig` stack output as the engine prints it: plain
//! YAML, JSON, a JSON-quoted string or base64.
//!
//! # Usage
//!
//! ```bash
//! # Pipe the secret output straight in
//! pulumi stack output kubeconfig --show-secrets | landfall kubeconfig -o ~/.kube/eks-helm
//!
//! # Read from a file
//! landfall kubeconfig --input exported.txt -o ./kubeconfig
//! ```

use std::path::{Path, PathBuf};

use clap::Args;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;
use zeroize::Zeroizing;

use landfall_cluster::{decode_kubeconfig, ClusterCredential};

use crate::{Error, Result};

/// Decode an exported kubeconfig
#[derive(Args, Debug)]
pub struct KubeconfigArgs {
    /// File holding the exported credential (default: stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file path, created with owner-only permissions (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the kubeconfig command
pub async fn run(args: KubeconfigArgs) -> Result<()> {
    let raw = read_input(args.input.as_deref()).await?;
    let credential = decode_kubeconfig(&raw)?;
    info!(
        context = credential.current_context().unwrap_or_default(),
        servers = credential.servers().len(),
        "decoded kubeconfig"
    );

    match &args.output {
        Some(path) => {
            write_private(path, &credential).await?;
            eprintln!("Kubeconfig written to {}", path.display());
        }
        None => print!("{}", credential.kubeconfig().as_str()),
    }
    Ok(())
}

async fn read_input(path: Option<&Path>) -> Result<Zeroizing<String>> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map(Zeroizing::new)
            .map_err(|e| {
                Error::command_failed(format!("failed to read {}: {}", path.display(), e))
            }),
        None => {
            let mut raw = Zeroizing::new(String::new());
            tokio::io::stdin().read_to_string(&mut raw).await?;
            Ok(raw)
        }
    }
}

/// Write the kubeconfig so that only the owner can read it. An existing file
/// is truncated and has its mode tightened.
pub async fn write_private(path: &Path, credential: &ClusterCredential) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(|e| {
        Error::command_failed(format!("failed to open {}: {}", path.display(), e))
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }
    file.write_all(credential.kubeconfig().as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
