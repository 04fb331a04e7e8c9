// ABOUTME: In-memory deployment directory for tests - scriptable state and failures.
// ABOUTME: Counts every remote call so tests can assert exactly which path ran.
//!
//! # Example
//!
//! ```no_run
//! use enginectl_agent::backends::mock::MockDirectory;
//! use enginectl_agent::{DeploymentDirectory, QueryEvent};
//!
//! # async fn example() {
//! let directory = MockDirectory::new()
//!     .with_instance("R1", "poc_if_agent_engine_fp_02")
//!     .on_query("R1", vec![QueryEvent::from_text("こんにちは")]);
//!
//! let instance = directory.get("R1").await.unwrap();
//! let mut stream = directory
//!     .stream_query(&instance, "test-user-001", "hello")
//!     .await
//!     .unwrap();
//! assert_eq!(stream.recv().await.unwrap().unwrap().text(), "こんにちは");
//! assert_eq!(directory.calls().stream, 1);
//! # }
//! ```

use crate::definition::{AgentDefinition, AgentIdentity, DeployMetadata, RemoteInstance};
use crate::error::{DeployError, Result};
use crate::event::QueryEvent;
use crate::stream::QueryStream;
use crate::traits::DeploymentDirectory;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const MOCK_PARENT: &str = "projects/mock-project/locations/us-central1";

/// Number of times each directory operation was invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub update: usize,
    pub get: usize,
    pub stream: usize,
    pub identity: usize,
}

/// A deployment as the mock stores it
#[derive(Debug, Clone)]
pub struct StoredDeployment {
    pub instance: RemoteInstance,
    pub definition: Option<AgentDefinition>,
    pub metadata: Option<DeployMetadata>,
    /// 1 after create, incremented by every update
    pub revision: u32,
}

/// A query the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub resource_name: String,
    pub user_id: String,
    pub message: String,
}

struct QueryScript {
    events: Vec<QueryEvent>,
    failure: Option<String>,
}

#[derive(Default)]
struct State {
    deployments: Vec<StoredDeployment>,
    next_id: u64,
    calls: CallCounts,
    updated: Vec<String>,
    queries: Vec<RecordedQuery>,
    scripts: HashMap<String, QueryScript>,
    list_failure: Option<String>,
    create_failure: Option<String>,
    reject_duplicates: bool,
    racers: Vec<String>,
}

/// Mock deployment directory
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<State>>,
}

impl MockDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        let directory = Self::default();
        directory.lock().next_id = 1000;
        directory
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing instance, as if deployed by an earlier run
    pub fn with_instance(self, resource_name: &str, display_name: &str) -> Self {
        self.lock().deployments.push(StoredDeployment {
            instance: RemoteInstance {
                resource_name: resource_name.to_string(),
                display_name: display_name.to_string(),
            },
            definition: None,
            metadata: None,
            revision: 1,
        });
        self
    }

    /// Make every list call fail with ServiceUnavailable
    pub fn fail_listing(self, reason: &str) -> Self {
        self.lock().list_failure = Some(reason.to_string());
        self
    }

    /// Make every create and create_identity call fail with a Deployment error
    pub fn fail_create(self, reason: &str) -> Self {
        self.lock().create_failure = Some(reason.to_string());
        self
    }

    /// Reject creates whose display name is already taken, like a
    /// server-side uniqueness constraint
    pub fn reject_duplicate_display_names(self) -> Self {
        self.lock().reject_duplicates = true;
        self
    }

    /// On the next create, another deployer wins the race: an instance with
    /// the same display name appears under `resource_name` and the create is
    /// rejected with Conflict.
    pub fn race_next_create(self, resource_name: &str) -> Self {
        self.lock().racers.push(resource_name.to_string());
        self
    }

    /// Script the events a query against `resource_name` yields
    pub fn on_query(self, resource_name: &str, events: Vec<QueryEvent>) -> Self {
        self.lock().scripts.insert(
            resource_name.to_string(),
            QueryScript {
                events,
                failure: None,
            },
        );
        self
    }

    /// Script events followed by a mid-stream transport failure
    pub fn on_query_then_fail(
        self,
        resource_name: &str,
        events: Vec<QueryEvent>,
        reason: &str,
    ) -> Self {
        self.lock().scripts.insert(
            resource_name.to_string(),
            QueryScript {
                events,
                failure: Some(reason.to_string()),
            },
        );
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Resource names passed to update, in call order
    pub fn updated(&self) -> Vec<String> {
        self.lock().updated.clone()
    }

    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.lock().queries.clone()
    }

    pub fn deployments(&self) -> Vec<StoredDeployment> {
        self.lock().deployments.clone()
    }

    pub fn instances(&self) -> Vec<RemoteInstance> {
        self.lock()
            .deployments
            .iter()
            .map(|d| d.instance.clone())
            .collect()
    }
}

#[async_trait]
impl DeploymentDirectory for MockDirectory {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn list(&self) -> BoxStream<'_, Result<RemoteInstance>> {
        let mut state = self.lock();
        state.calls.list += 1;

        if let Some(reason) = &state.list_failure {
            let err = DeployError::ServiceUnavailable(reason.clone());
            return stream::iter(vec![Err(err)]).boxed();
        }

        let snapshot: Vec<Result<RemoteInstance>> = state
            .deployments
            .iter()
            .map(|d| Ok(d.instance.clone()))
            .collect();
        stream::iter(snapshot).boxed()
    }

    async fn create(
        &self,
        definition: &AgentDefinition,
        metadata: &DeployMetadata,
    ) -> Result<RemoteInstance> {
        let mut state = self.lock();
        state.calls.create += 1;

        if let Some(reason) = &state.create_failure {
            return Err(DeployError::deployment("create", reason));
        }

        if !state.racers.is_empty() {
            let racer = state.racers.remove(0);
            state.deployments.push(StoredDeployment {
                instance: RemoteInstance {
                    resource_name: racer,
                    display_name: metadata.display_name.clone(),
                },
                definition: None,
                metadata: None,
                revision: 1,
            });
            return Err(DeployError::Conflict {
                display_name: metadata.display_name.clone(),
            });
        }

        if state.reject_duplicates
            && state
                .deployments
                .iter()
                .any(|d| d.instance.display_name == metadata.display_name)
        {
            return Err(DeployError::Conflict {
                display_name: metadata.display_name.clone(),
            });
        }

        state.next_id += 1;
        let instance = RemoteInstance {
            resource_name: format!("{}/reasoningEngines/{}", MOCK_PARENT, state.next_id),
            display_name: metadata.display_name.clone(),
        };
        state.deployments.push(StoredDeployment {
            instance: instance.clone(),
            definition: Some(definition.clone()),
            metadata: Some(metadata.clone()),
            revision: 1,
        });
        Ok(instance)
    }

    async fn update(
        &self,
        resource_name: &str,
        definition: &AgentDefinition,
        metadata: &DeployMetadata,
    ) -> Result<RemoteInstance> {
        let mut state = self.lock();
        state.calls.update += 1;
        state.updated.push(resource_name.to_string());

        let deployment = state
            .deployments
            .iter_mut()
            .find(|d| d.instance.resource_name == resource_name)
            .ok_or_else(|| DeployError::instance_not_found(resource_name))?;

        deployment.instance.display_name = metadata.display_name.clone();
        deployment.definition = Some(definition.clone());
        deployment.metadata = Some(metadata.clone());
        deployment.revision += 1;
        Ok(deployment.instance.clone())
    }

    async fn create_identity(&self) -> Result<AgentIdentity> {
        let mut state = self.lock();
        state.calls.identity += 1;

        if let Some(reason) = &state.create_failure {
            return Err(DeployError::deployment("create_identity", reason));
        }

        state.next_id += 1;
        let id = state.next_id;
        let resource_name = format!("{}/reasoningEngines/{}", MOCK_PARENT, id);
        state.deployments.push(StoredDeployment {
            instance: RemoteInstance {
                resource_name: resource_name.clone(),
                display_name: String::new(),
            },
            definition: None,
            metadata: None,
            revision: 1,
        });
        Ok(AgentIdentity {
            resource_name,
            service_account: format!("agent-{}@mock-project.iam.gserviceaccount.com", id),
        })
    }

    async fn get(&self, resource_name: &str) -> Result<RemoteInstance> {
        let mut state = self.lock();
        state.calls.get += 1;
        state
            .deployments
            .iter()
            .find(|d| d.instance.resource_name == resource_name)
            .map(|d| d.instance.clone())
            .ok_or_else(|| DeployError::instance_not_found(resource_name))
    }

    async fn stream_query(
        &self,
        instance: &RemoteInstance,
        user_id: &str,
        message: &str,
    ) -> Result<QueryStream> {
        let mut state = self.lock();
        state.calls.stream += 1;
        state.queries.push(RecordedQuery {
            resource_name: instance.resource_name.clone(),
            user_id: user_id.to_string(),
            message: message.to_string(),
        });

        let items = match state.scripts.get(&instance.resource_name) {
            Some(script) => {
                let mut items: Vec<Result<QueryEvent>> =
                    script.events.iter().cloned().map(Ok).collect();
                if let Some(reason) = &script.failure {
                    items.push(Err(DeployError::Stream(reason.clone())));
                }
                items
            }
            None => Vec::new(),
        };
        Ok(QueryStream::from_items(items))
    }
}
