// ABOUTME: Tests for command-line parsing.

use clap::Parser;
use enginectl::cli::{Cli, Command};
use std::path::PathBuf;

#[test]
fn test_parse_deploy() {
    let cli = Cli::try_parse_from(["enginectl", "deploy", "fp_agent"]).unwrap();
    assert_eq!(
        cli.command,
        Command::Deploy {
            agent: "fp_agent".to_string()
        }
    );
    assert_eq!(cli.command.name(), "deploy");
    assert!(cli.command.is_remote());
    assert!(!cli.log_json);
    assert!(cli.config.is_none());
}

#[test]
fn test_parse_verify_with_overrides() {
    let cli = Cli::try_parse_from([
        "enginectl",
        "verify",
        "projects/p/locations/us-central1/reasoningEngines/42",
        "--user-id",
        "u-7",
        "--query",
        "hello",
    ])
    .unwrap();

    match cli.command {
        Command::Verify {
            resource,
            user_id,
            query,
        } => {
            assert_eq!(resource, "projects/p/locations/us-central1/reasoningEngines/42");
            assert_eq!(user_id.as_deref(), Some("u-7"));
            assert_eq!(query.as_deref(), Some("hello"));
        }
        other => panic!("Expected Verify, got {:?}", other),
    }
}

#[test]
fn test_verify_flags_are_optional() {
    let resource = "projects/p/locations/us-central1/reasoningEngines/1";
    let cli = Cli::try_parse_from(["enginectl", "verify", resource]).unwrap();
    assert_eq!(
        cli.command,
        Command::Verify {
            resource: resource.to_string(),
            user_id: None,
            query: None,
        }
    );
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli =
        Cli::try_parse_from(["enginectl", "list", "--config", "prod.toml", "--log-json"]).unwrap();
    assert_eq!(cli.command, Command::List);
    assert_eq!(cli.config, Some(PathBuf::from("prod.toml")));
    assert!(cli.log_json);
}

#[test]
fn test_agents_is_local() {
    let cli = Cli::try_parse_from(["enginectl", "agents"]).unwrap();
    assert_eq!(cli.command.name(), "agents");
    assert!(!cli.command.is_remote());
}

#[test]
fn test_deploy_requires_agent_name() {
    assert!(Cli::try_parse_from(["enginectl", "deploy"]).is_err());
}

#[test]
fn test_verify_rejects_malformed_resource_name() {
    for bad in ["R1", "projects/p/locations/l/agents/1", "reasoningEngines/1"] {
        let err = Cli::try_parse_from(["enginectl", "verify", bad]).unwrap_err();
        assert!(err.to_string().contains("reasoningEngines/<id>"), "{}", err);
    }
}

#[test]
fn test_parse_create_identity() {
    let cli = Cli::try_parse_from(["enginectl", "create-identity"]).unwrap();
    assert_eq!(cli.command, Command::CreateIdentity);
    assert_eq!(cli.command.name(), "create-identity");
    assert!(cli.command.is_remote());
}
