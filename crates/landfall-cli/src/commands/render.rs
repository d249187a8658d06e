//! `landfall render` - compose a stack and emit it as a YAML program
//!
//! # Usage
//!
//! ```bash
//! # EKS stack from a stack file, printed to stdout
//! landfall render --cloud aws -c Pulumi.dev.yaml
//!
//! # AKS stack with an override, saved next to the stack file
//! landfall render --cloud azure --location westeurope -o Pulumi.yaml
//! ```

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use landfall_app::{compose_stack, zone_source};
use landfall_common::render::render_program;

use super::StackArgs;
use crate::{Error, Result};

/// Render a stack as a YAML program
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the render command
pub async fn run(args: RenderArgs) -> Result<()> {
    let config = args.stack.load_config()?;
    let cloud = args.stack.cloud;
    let zones = zone_source(&config, cloud);
    let composition = compose_stack(&config, cloud, zones.as_ref()).await?;
    let program = render_program(&composition.stack)?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &program).await.map_err(|e| {
                Error::command_failed(format!(
                    "failed to write program to {}: {}",
                    path.display(),
                    e
                ))
            })?;
            info!(
                stack = %composition.stack.name(),
                path = %path.display(),
                "rendered program"
            );
            eprintln!("Program written to {}", path.display());
        }
        None => print!("{}", program),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ConfigOverrides;
    use landfall_common::Cloud;

    fn args(cloud: Cloud, output: PathBuf) -> RenderArgs {
        RenderArgs {
            stack: StackArgs {
                cloud,
                config: None,
                overrides: ConfigOverrides {
                    zones: Some(vec!["zone-a".into(), "zone-b".into()]),
                    location: Some("westeurope".into()),
                    ..Default::default()
                },
            },
            output: Some(output),
        }
    }

    #[tokio::test]
    async fn writes_program_to_output_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("Pulumi.yaml");
        run(args(Cloud::Azure, path.clone())).await.expect("render");

        let text = std::fs::read_to_string(&path).expect("read program");
        assert!(text.contains("name: aks-helm"));
        assert!(text.contains("fn::secret"));
        assert!(text.contains("aks-helm-apache-chart"));
    }

    #[tokio::test]
    async fn invalid_mask_writes_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("Pulumi.yaml");
        let mut args = args(Cloud::Aws, path.clone());
        args.stack.overrides.subnet_mask = Some("255.0.255.0".into());

        let err = run(args).await.unwrap_err();
        assert!(matches!(err, Error::Landfall(ref e) if e.is_configuration()));
        assert!(!path.exists());
    }
}
