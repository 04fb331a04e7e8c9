// ABOUTME: Core DeploymentDirectory trait that all remote backends implement.
// ABOUTME: Covers list/create/update/get on deployed instances, identity-only creation and query streaming.

use crate::definition::{AgentDefinition, AgentIdentity, DeployMetadata, RemoteInstance};
use crate::error::Result;
use crate::stream::QueryStream;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// View of the remote agent-hosting service.
///
/// Backends hold no cached state: every call reflects the remote service at
/// the time it is made. Nothing here enforces display-name uniqueness.
#[async_trait]
pub trait DeploymentDirectory: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Lazily list deployed instances.
    ///
    /// The stream is finite. Pages are fetched on demand, so a consumer that
    /// stops early never pays for the rest. Transport or auth failures surface
    /// as `ServiceUnavailable` items.
    fn list(&self) -> BoxStream<'_, Result<RemoteInstance>>;

    /// Deploy a new instance. Calling twice may produce duplicate display names.
    async fn create(
        &self,
        definition: &AgentDefinition,
        metadata: &DeployMetadata,
    ) -> Result<RemoteInstance>;

    /// Replace code and configuration of an existing instance in place.
    /// The resource name is preserved.
    async fn update(
        &self,
        resource_name: &str,
        definition: &AgentDefinition,
        metadata: &DeployMetadata,
    ) -> Result<RemoteInstance>;

    /// Create an instance that carries only an agent identity, no code.
    ///
    /// The caller grants IAM roles to the returned service account before
    /// deploying anything that runs as it.
    async fn create_identity(&self) -> Result<AgentIdentity>;

    /// Look up one instance by resource name
    async fn get(&self, resource_name: &str) -> Result<RemoteInstance>;

    /// Open a streaming query against a resolved instance
    async fn stream_query(
        &self,
        instance: &RemoteInstance,
        user_id: &str,
        message: &str,
    ) -> Result<QueryStream>;
}
