// ABOUTME: Tests for the in-memory MockDirectory backend.
// ABOUTME: Checks call counting, scripted failures and duplicate-name handling.

use enginectl_agent::backends::mock::MockDirectory;
use enginectl_agent::{
    AgentDefinition, DeployError, DeployMetadata, DeploymentDirectory, QueryEvent,
};
use futures::StreamExt;

fn metadata(display_name: &str) -> DeployMetadata {
    DeployMetadata {
        display_name: display_name.to_string(),
        description: String::new(),
        requirements: Vec::new(),
        staging_location: "gs://bucket".to_string(),
    }
}

fn definition() -> AgentDefinition {
    AgentDefinition::new("fp_agent", "gemini-2.5-flash", "")
}

#[tokio::test]
async fn test_create_then_list_sees_new_instance() {
    let directory = MockDirectory::new();
    let created = directory
        .create(&definition(), &metadata("engine"))
        .await
        .unwrap();

    let listed: Vec<_> = directory.list().collect().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].as_ref().unwrap(), &created);
    assert_eq!(directory.calls().create, 1);
    assert_eq!(directory.calls().list, 1);
}

#[tokio::test]
async fn test_create_twice_allows_duplicate_display_names() {
    let directory = MockDirectory::new();
    let first = directory
        .create(&definition(), &metadata("same"))
        .await
        .unwrap();
    let second = directory
        .create(&definition(), &metadata("same"))
        .await
        .unwrap();

    assert_ne!(first.resource_name, second.resource_name);
    assert_eq!(directory.instances().len(), 2);
}

#[tokio::test]
async fn test_reject_duplicates_returns_conflict() {
    let directory = MockDirectory::new()
        .with_instance("R1", "same")
        .reject_duplicate_display_names();

    let err = directory
        .create(&definition(), &metadata("same"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_update_bumps_revision_and_keeps_name() {
    let directory = MockDirectory::new().with_instance("R1", "engine");
    let updated = directory
        .update("R1", &definition(), &metadata("engine"))
        .await
        .unwrap();

    assert_eq!(updated.resource_name, "R1");
    assert_eq!(directory.deployments()[0].revision, 2);
    assert_eq!(directory.updated(), vec!["R1"]);
}

#[tokio::test]
async fn test_update_and_get_unknown_are_not_found() {
    let directory = MockDirectory::new();
    assert!(directory
        .update("gone", &definition(), &metadata("x"))
        .await
        .unwrap_err()
        .is_not_found());
    assert!(directory.get("gone").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_listing_failure_yields_service_unavailable() {
    let directory = MockDirectory::new()
        .with_instance("R1", "engine")
        .fail_listing("token expired");

    let items: Vec<_> = directory.list().collect().await;
    assert!(matches!(
        items.as_slice(),
        [Err(DeployError::ServiceUnavailable(_))]
    ));
}

#[tokio::test]
async fn test_scripted_query_with_failure() {
    let directory = MockDirectory::new()
        .with_instance("R1", "engine")
        .on_query_then_fail("R1", vec![QueryEvent::from_text("one")], "reset");

    let instance = directory.get("R1").await.unwrap();
    let mut stream = directory
        .stream_query(&instance, "u", "hello")
        .await
        .unwrap();

    assert_eq!(stream.recv().await.unwrap().unwrap().text(), "one");
    assert!(matches!(
        stream.recv().await,
        Some(Err(DeployError::Stream(_)))
    ));
    assert!(stream.recv().await.is_none());
    assert_eq!(directory.queries()[0].message, "hello");
}

#[tokio::test]
async fn test_create_identity_adds_codeless_instance() {
    let directory = MockDirectory::new();

    let identity = directory.create_identity().await.unwrap();
    assert!(identity.service_account.ends_with(".iam.gserviceaccount.com"));
    assert_eq!(directory.calls().identity, 1);
    assert_eq!(directory.calls().create, 0);

    let deployments = directory.deployments();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].instance.resource_name, identity.resource_name);
    assert!(deployments[0].definition.is_none());
}

#[tokio::test]
async fn test_create_identity_honours_create_failure() {
    let directory = MockDirectory::new().fail_create("quota exceeded");

    let err = directory.create_identity().await.unwrap_err();
    assert!(matches!(err, DeployError::Deployment { ref operation, .. } if operation == "create_identity"));
    assert!(directory.instances().is_empty());
}
