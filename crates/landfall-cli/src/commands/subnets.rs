//! `landfall subnets` - show how an address block is split
//!
//! With zones (from `--zones` or the stack file) prints the public and
//! private range each zone receives; otherwise lists the plan itself.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use landfall_network::{AddressBlock, SubnetPlan, ZoneAllocation};

use super::{load_config, ConfigOverrides};
use crate::Result;

/// Show the subnet plan for an address block
#[derive(Args, Debug)]
pub struct SubnetsArgs {
    /// Stack file with a `config:` map of settings
    #[arg(short = 'c', long = "config", env = "LANDFALL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Maximum number of plan entries to list
    #[arg(long, default_value = "64")]
    pub limit: u64,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Run the subnets command
pub fn run(args: SubnetsArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.overrides)?;
    let block = AddressBlock::parse(config.cidr_block(), config.subnet_mask())?;
    let plan = block.plan();

    let text = match &config.availability_zones {
        Some(zones) => {
            let allocations = plan.allocate(zones)?;
            if args.json {
                allocations_json(&allocations)
            } else {
                allocations_table(&block, &allocations)
            }
        }
        None if args.json => plan_json(&plan, args.limit),
        None => plan_table(&block, &plan, args.limit),
    };
    println!("{}", text);
    Ok(())
}

fn plan_table(block: &AddressBlock, plan: &SubnetPlan, limit: u64) -> String {
    let mut lines = vec![format!("{} ({} subnets)", block, plan.len())];
    lines.extend(
        plan.iter()
            .take(limit as usize)
            .enumerate()
            .map(|(i, net)| format!("{:>6}  {}", i, net)),
    );
    if plan.len() > limit {
        lines.push(format!("  ... {} more", plan.len() - limit));
    }
    lines.join("\n")
}

fn plan_json(plan: &SubnetPlan, limit: u64) -> String {
    let subnets: Vec<String> = plan
        .iter()
        .take(limit as usize)
        .map(|n| n.to_string())
        .collect();
    json!({ "total": plan.len(), "subnets": subnets }).to_string()
}

fn allocations_table(block: &AddressBlock, allocations: &[ZoneAllocation]) -> String {
    let width = allocations
        .iter()
        .map(|a| a.zone.len())
        .max()
        .unwrap_or(0)
        .max("ZONE".len());
    let mut lines = vec![
        block.to_string(),
        format!("{:<width$}  {:<18}  {}", "ZONE", "PUBLIC", "PRIVATE"),
    ];
    lines.extend(allocations.iter().map(|a| {
        format!(
            "{:<width$}  {:<18}  {}",
            a.zone,
            a.public.to_string(),
            a.private
        )
    }));
    lines.join("\n")
}

fn allocations_json(allocations: &[ZoneAllocation]) -> String {
    let zones: Vec<_> = allocations
        .iter()
        .map(|a| {
            json!({
                "zone": a.zone,
                "public": a.public.to_string(),
                "private": a.private.to_string(),
            })
        })
        .collect();
    json!(zones).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> AddressBlock {
        AddressBlock::parse("10.255.0.0/16", "255.255.240.0").expect("block")
    }

    #[test]
    fn plan_table_is_truncated_at_limit() {
        let block = block();
        let table = plan_table(&block, &block.plan(), 2);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("10.255.0.0/20"));
        assert!(lines[2].ends_with("10.255.16.0/20"));
        assert_eq!(lines[3], "  ... 14 more");
    }

    #[test]
    fn allocations_alternate_public_and_private() {
        let block = block();
        let zones = vec!["a".to_string(), "b".to_string()];
        let allocations = block.plan().allocate(&zones).expect("allocate");
        let value: serde_json::Value =
            serde_json::from_str(&allocations_json(&allocations)).expect("json");
        assert_eq!(value[0]["public"], "10.255.0.0/20");
        assert_eq!(value[0]["private"], "10.255.16.0/20");
        assert_eq!(value[1]["public"], "10.255.32.0/20");
        assert_eq!(value[1]["private"], "10.255.48.0/20");
    }

    #[test]
    fn too_many_zones_is_an_error() {
        let args = SubnetsArgs {
            config: None,
            overrides: ConfigOverrides {
                cidr_block: Some("10.0.0.0/24".into()),
                subnet_mask: Some("255.255.255.128".into()),
                zones: Some(vec!["a".into(), "b".into()]),
                ..Default::default()
            },
            limit: 64,
            json: false,
        };
        assert!(run(args).is_err());
    }
}
