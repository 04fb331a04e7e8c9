// ABOUTME: Agent definitions and remote deployment directory abstraction for enginectl.
// ABOUTME: Provides the registry, the DeploymentDirectory trait, and Vertex/mock backends.

pub mod agents;
pub mod definition;
pub mod error;
pub mod event;
pub mod registry;
pub mod stream;
pub mod traits;

pub mod backends;

pub use definition::{
    AgentDefinition, AgentIdentity, DeployMetadata, RemoteInstance, ResourceName,
};
pub use error::{DeployError, NotFoundKind, Result};
pub use event::QueryEvent;
pub use registry::{AgentEntry, AgentFactory, AgentRegistry, DeployDefaults};
pub use stream::{QuerySink, QueryStream};
pub use traits::DeploymentDirectory;
