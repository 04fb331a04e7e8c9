// ABOUTME: Tests for subcommand handlers against the mock directory.
// ABOUTME: Output is captured in a buffer and checked for the key lines.

use enginectl::commands;
use enginectl_agent::backends::mock::MockDirectory;
use enginectl_agent::{AgentRegistry, QueryEvent};
use enginectl_core::{Config, DeployAction, VerifyOutcome};

fn config() -> Config {
    Config::parse(
        r#"
[project]
project_id = "fifth-boulder"

[deploy]
staging_location = "gs://agents-staging"
"#,
    )
    .unwrap()
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn test_deploy_prints_resource_name() {
    let config = config();
    let registry = AgentRegistry::builtin(config.deploy_defaults());
    let directory = MockDirectory::new();
    let mut buf = Vec::new();

    let outcome = commands::deploy(&config, &registry, &directory, "fp_agent", &mut buf)
        .await
        .unwrap();

    assert_eq!(outcome.action, DeployAction::Created);
    let out = output(buf);
    assert!(out.contains("Deploying agent: fp_agent"));
    assert!(out.contains("poc_if_agent_engine_fp_02 created"));
    assert!(out.contains(&format!("RESOURCE_NAME=\"{}\"", outcome.resource_name)));
}

#[tokio::test]
async fn test_deploy_reports_update() {
    let config = config();
    let registry = AgentRegistry::builtin(config.deploy_defaults());
    let directory = MockDirectory::new().with_instance("R1", "sample-agent-adk");
    let mut buf = Vec::new();

    let outcome = commands::deploy(&config, &registry, &directory, "sample_agent", &mut buf)
        .await
        .unwrap();

    assert_eq!(outcome.resource_name, "R1");
    assert!(output(buf).contains("sample-agent-adk updated in place"));
}

#[tokio::test]
async fn test_deploy_unknown_agent_errors() {
    let config = config();
    let registry = AgentRegistry::builtin(config.deploy_defaults());
    let directory = MockDirectory::new();
    let mut buf = Vec::new();

    let err = commands::deploy(&config, &registry, &directory, "tax_agent", &mut buf)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("tax_agent"));
    assert_eq!(directory.calls().list, 0);
}

#[tokio::test]
async fn test_verify_prints_event_text() {
    let directory = MockDirectory::new()
        .with_instance("R1", "engine")
        .on_query("R1", vec![QueryEvent::from_text("元気です")]);
    let mut buf = Vec::new();

    let verification = commands::verify(&directory, "R1", "u", "hello", &mut buf)
        .await
        .unwrap();

    assert_eq!(verification.outcome, VerifyOutcome::Responsive);
    let out = output(buf);
    assert!(out.contains("元気です"));
    assert!(out.contains("[ok] agent responded with 1 event(s)"));
}

#[tokio::test]
async fn test_verify_silent_agent_warns() {
    let directory = MockDirectory::new().with_instance("R1", "engine");
    let mut buf = Vec::new();

    let verification = commands::verify(&directory, "R1", "u", "hello", &mut buf)
        .await
        .unwrap();

    assert!(!verification.is_success());
    assert!(output(buf).contains("[warn]"));
}

#[tokio::test]
async fn test_verify_missing_instance_hints_deploy() {
    let directory = MockDirectory::new();
    let mut buf = Vec::new();

    let err = commands::verify(&directory, "R404", "u", "hello", &mut buf)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("R404"));
    assert!(output(buf).contains("enginectl deploy"));
}

#[tokio::test]
async fn test_list_prints_each_instance() {
    let directory = MockDirectory::new()
        .with_instance("R1", "one")
        .with_instance("R2", "two");
    let mut buf = Vec::new();

    let count = commands::list(&directory, &mut buf).await.unwrap();

    assert_eq!(count, 2);
    let out = output(buf);
    assert!(out.contains("one\tR1"));
    assert!(out.contains("two\tR2"));
}

#[tokio::test]
async fn test_list_failure_is_an_error() {
    let directory = MockDirectory::new().fail_listing("unavailable");
    let mut buf = Vec::new();

    assert!(commands::list(&directory, &mut buf).await.is_err());
}

#[test]
fn test_agents_lists_builtin_registry() {
    let registry = AgentRegistry::builtin(config().deploy_defaults());
    let mut buf = Vec::new();

    commands::agents(&registry, &mut buf).unwrap();

    let out = output(buf);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("fp_agent\tpoc_if_agent_engine_fp_02\tgemini-2.5-flash"));
    assert!(lines[1].starts_with("sample_agent\tsample-agent-adk"));
}

#[tokio::test]
async fn test_create_identity_prints_iam_bindings() {
    let config = config();
    let directory = MockDirectory::new();
    let mut buf = Vec::new();

    let identity = commands::create_identity(&config, &directory, &mut buf)
        .await
        .unwrap();

    let out = output(buf);
    assert!(out.contains("Creating agent engine in fifth-boulder/us-central1"));
    assert!(out.contains(&identity.resource_name));
    assert!(out.contains(&format!("export SERVICE_ACCOUNT=\"{}\"", identity.service_account)));
    assert!(out.contains("export PROJECT_ID=\"fifth-boulder\""));
    for role in commands::IDENTITY_ROLES {
        assert!(out.contains(&format!("--role=\"{}\"", role)));
    }
    assert_eq!(out.matches("gcloud projects add-iam-policy-binding").count(), 2);
}

#[tokio::test]
async fn test_create_identity_failure_prints_no_next_steps() {
    let config = config();
    let directory = MockDirectory::new().fail_create("permission denied");
    let mut buf = Vec::new();

    let err = commands::create_identity(&config, &directory, &mut buf)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("permission denied"));
    assert!(!output(buf).contains("gcloud"));
}
