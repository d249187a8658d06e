//! Validate command

use clap::Args;

use landfall_app::{compose_stack, zone_source};
use landfall_common::{Cloud, StackConfig};
use landfall_network::{NetworkPolicy, ZoneSource};

use super::StackArgs;
use crate::Result;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Also print the order resources would be created in
    #[arg(long)]
    pub order: bool,
}

/// What a validation pass found
#[derive(Debug, Default)]
pub struct Report {
    /// Lines describing what passed
    pub checked: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Creation order, when the graph is sound
    pub order: Vec<String>,
}

pub async fn run(args: ValidateArgs) -> Result<()> {
    let config = args.stack.load_config()?;
    let cloud = args.stack.cloud;
    let zones = zone_source(&config, cloud);
    let report = check(&config, cloud, zones.as_ref()).await;

    for line in &report.checked {
        println!("  {} valid", line);
    }
    println!();

    if args.order && !report.order.is_empty() {
        println!("Creation order:");
        for (i, name) in report.order.iter().enumerate() {
            println!("  {:>3}. {}", i + 1, name);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
        println!();
    }

    if report.errors.is_empty() {
        println!("All validations passed");
        Ok(())
    } else {
        println!("Validation errors:");
        for error in &report.errors {
            println!("  - {}", error);
        }
        Err(crate::Error::validation(format!(
            "{} validation errors",
            report.errors.len()
        )))
    }
}

/// Compose the stack for `cloud` and collect findings instead of stopping
/// at the first one
pub async fn check(config: &StackConfig, cloud: Cloud, zones: &dyn ZoneSource) -> Report {
    let mut report = Report::default();

    match NetworkPolicy::from_config(config) {
        Ok(policy) => {
            if policy.allows_internet() {
                report
                    .warnings
                    .push("an ingress rule admits 0.0.0.0/0".to_string());
            }
            if policy.private_subnet_public_ips {
                report
                    .warnings
                    .push("private subnets assign public IPs on launch".to_string());
            }
        }
        Err(e) => report.errors.push(e.to_string()),
    }
    if cloud == Cloud::Aws
        && config
            .availability_zones
            .as_ref()
            .is_some_and(|z| z.len() < 2)
    {
        report
            .warnings
            .push("EKS requires subnets in at least two availability zones".to_string());
    }

    let composition = match compose_stack(config, cloud, zones).await {
        Ok(composition) => composition,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };

    let stack = &composition.stack;
    report.checked.push(format!(
        "network {} ({} zones)",
        composition.network.network,
        composition.network.allocations.len()
    ));
    report
        .checked
        .push(format!("cluster {}", composition.cluster.control_plane));
    report.checked.push(format!(
        "release {} in {}",
        composition.application.release, composition.application.namespace
    ));
    report.checked.push(format!(
        "stack {} ({} resources, {} outputs)",
        stack.name(),
        stack.resources().len(),
        stack.outputs().count()
    ));

    match stack.topological_order() {
        Ok(order) => report.order = order.into_iter().map(String::from).collect(),
        Err(e) => report.errors.push(e.to_string()),
    }
    report
}
