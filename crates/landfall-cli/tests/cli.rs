//! End-to-end runs of the `landfall` command line

use clap::Parser;
use landfall_cli::{Cli, Commands};
use landfall_common::Cloud;
use rstest::rstest;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("landfall").chain(args.iter().copied()))
        .expect("arguments should parse")
}

#[rstest]
#[case("aws", Cloud::Aws)]
#[case("eks", Cloud::Aws)]
#[case("azure", Cloud::Azure)]
fn render_accepts_cloud_names(#[case] flag: &str, #[case] expected: Cloud) {
    let cli = parse(&["render", "--cloud", flag, "--zones", "a,b"]);
    let Commands::Render(args) = cli.command else {
        panic!("expected render");
    };
    assert_eq!(args.stack.cloud, expected);
    assert_eq!(
        args.stack.overrides.zones,
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[test]
fn unknown_cloud_is_rejected() {
    assert!(Cli::try_parse_from(["landfall", "render", "--cloud", "gcp"]).is_err());
}

#[tokio::test]
async fn render_writes_program_from_stack_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = dir.path().join("Pulumi.dev.yaml");
    let output = dir.path().join("Pulumi.yaml");
    std::fs::write(
        &config,
        "config:\n  landfall:service_name: demo\n  landfall:availabilityZones:\n    - us-east-1a\n    - us-east-1b\n",
    )
    .expect("write stack file");

    let cli = parse(&[
        "render",
        "--cloud",
        "aws",
        "-c",
        config.to_str().expect("utf-8 path"),
        "-o",
        output.to_str().expect("utf-8 path"),
    ]);
    cli.run().await.expect("render");

    let program = std::fs::read_to_string(&output).expect("read program");
    assert!(program.contains("name: demo"));
    assert!(program.contains("demo-subnet-public-us-east-1a"));
    assert!(program.contains("demo-apache-chart"));
}

#[tokio::test]
async fn subnets_fails_when_zones_do_not_fit() {
    let cli = parse(&[
        "subnets",
        "--cidr-block",
        "10.0.0.0/24",
        "--subnet-mask",
        "255.255.255.128",
        "--zones",
        "a,b",
    ]);
    assert!(cli.run().await.is_err());
}

#[tokio::test]
async fn kubeconfig_rejects_empty_input_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("empty.txt");
    let output = dir.path().join("kubeconfig");
    std::fs::write(&input, "").expect("write input");

    let cli = parse(&[
        "kubeconfig",
        "--input",
        input.to_str().expect("utf-8 path"),
        "-o",
        output.to_str().expect("utf-8 path"),
    ]);
    assert!(cli.run().await.is_err());
    assert!(!output.exists());
}
