// ABOUTME: Data model for deployable agents and the remote instances they become.
// ABOUTME: Definitions are immutable; remote instances only come back from a directory.

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};

/// Model identifier, instruction and name describing one agent behavior.
///
/// Fields are private so a definition cannot change after the registry hands
/// it to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentDefinition {
    name: String,
    model_id: String,
    instruction: String,
}

impl AgentDefinition {
    pub fn new(
        name: impl Into<String>,
        model_id: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            instruction: instruction.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

/// Deployment metadata attached to an agent definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployMetadata {
    /// Label used to match this agent against remote instances
    pub display_name: String,
    pub description: String,
    /// Packages the remote runtime installs, in order
    pub requirements: Vec<String>,
    /// Bucket URI where packaged code is staged (e.g. "gs://bucket")
    pub staging_location: String,
}

/// A deployed instance as reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInstance {
    /// Opaque resource name assigned by the remote service
    pub resource_name: String,
    pub display_name: String,
}

/// An engine created with its own agent identity and no deployed code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub resource_name: String,
    /// Principal the engine runs as; IAM roles are granted to this
    pub service_account: String,
}

/// Parsed form of `projects/<id>/locations/<region>/reasoningEngines/<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceName {
    pub project: String,
    pub location: String,
    pub engine_id: String,
}

impl ResourceName {
    pub fn parse(resource_name: &str) -> Result<Self> {
        let parts: Vec<&str> = resource_name.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "locations", location, "reasoningEngines", engine_id]
                if !project.is_empty() && !location.is_empty() && !engine_id.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    location: location.to_string(),
                    engine_id: engine_id.to_string(),
                })
            }
            _ => Err(DeployError::Config(format!(
                "Invalid resource name '{}'. Expected: projects/<project>/locations/<location>/reasoningEngines/<id>",
                resource_name
            ))),
        }
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/reasoningEngines/{}",
            self.project, self.location, self.engine_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_name() {
        let name = "projects/803525069908/locations/us-central1/reasoningEngines/4561659338875207680";
        let parsed = ResourceName::parse(name).unwrap();
        assert_eq!(parsed.project, "803525069908");
        assert_eq!(parsed.location, "us-central1");
        assert_eq!(parsed.engine_id, "4561659338875207680");
        assert_eq!(parsed.to_string(), name);
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for bad in [
            "",
            "R1",
            "projects/p/locations/l/agents/1",
            "projects//locations/l/reasoningEngines/1",
            "projects/p/locations/l/reasoningEngines/1/sessions/2",
        ] {
            assert!(ResourceName::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }
}
