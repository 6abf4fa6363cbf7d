//! CLI argument tests

use super::*;
use clap::Parser;
use std::path::PathBuf;
use test_case::test_case;

#[test]
fn test_parse_run_command() {
    let cli = Cli::try_parse_from([
        "recordflow",
        "run",
        "--config",
        "flow.yaml",
        "--input",
        "in.json",
        "--output",
        "out",
        "--attr",
        "tenant=acme",
        "-a",
        "region=eu",
    ])
    .unwrap();

    let Commands::Run {
        config,
        attributes,
        lookup,
        routing,
        ..
    } = cli.command
    else {
        panic!("expected run command");
    };
    assert_eq!(config, PathBuf::from("flow.yaml"));
    assert_eq!(
        attributes,
        vec![
            ("tenant".to_string(), "acme".to_string()),
            ("region".to_string(), "eu".to_string()),
        ]
    );
    assert!(lookup.is_none());
    assert_eq!(routing, RoutingArg::Success);
    assert_eq!(cli.format, OutputFormat::Json);
}

#[test]
fn test_lookup_requires_key() {
    let result = Cli::try_parse_from([
        "recordflow",
        "run",
        "-c",
        "flow.yaml",
        "-i",
        "in.json",
        "-o",
        "out",
        "--lookup",
        "customers.json",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["recordflow", "infer", "-e", "example.json", "--verbose", "-f", "pretty"])
        .unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.format, OutputFormat::Pretty);
}

#[test_case("a=b", Some(("a", "b")) ; "simple")]
#[test_case("url=http://x?y=1", Some(("url", "http://x?y=1")) ; "value keeps equals")]
#[test_case("empty=", Some(("empty", "")) ; "empty value")]
#[test_case("novalue", None ; "missing equals")]
#[test_case("=x", None ; "empty key")]
fn test_parse_attribute(input: &str, expected: Option<(&str, &str)>) {
    let parsed = parse_attribute(input).ok();
    let expected = expected.map(|(k, v)| (k.to_string(), v.to_string()));
    assert_eq!(parsed, expected);
}
