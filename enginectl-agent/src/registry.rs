// ABOUTME: Compile-time registry mapping agent names to definition factories.
// ABOUTME: Resolving a name yields the definition plus the metadata used for deployment.

use crate::agents;
use crate::definition::{AgentDefinition, DeployMetadata};
use crate::error::{DeployError, Result};
use std::collections::HashMap;

/// What an agent factory produces
#[derive(Debug, Clone)]
pub struct AgentEntry {
    pub definition: AgentDefinition,
    /// Falls back to the agent name when None
    pub display_name: Option<String>,
    pub description: String,
}

/// Factory function that builds an agent entry
pub type AgentFactory = Box<dyn Fn() -> AgentEntry + Send + Sync>;

/// Deployment settings shared by every agent in a registry
#[derive(Debug, Clone, Default)]
pub struct DeployDefaults {
    pub requirements: Vec<String>,
    pub staging_location: String,
}

/// Registry of deployable agents
pub struct AgentRegistry {
    factories: HashMap<String, AgentFactory>,
    defaults: DeployDefaults,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new(defaults: DeployDefaults) -> Self {
        Self {
            factories: HashMap::new(),
            defaults,
        }
    }

    /// Registry with every agent shipped in this crate
    pub fn builtin(defaults: DeployDefaults) -> Self {
        Self::new(defaults)
            .register(agents::fp_agent::NAME, agents::fp_agent::entry)
            .register(agents::sample_agent::NAME, agents::sample_agent::entry)
    }

    /// Register an agent factory by name
    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> AgentEntry + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Resolve an agent name into its definition and deployment metadata
    pub fn resolve(&self, name: &str) -> Result<(AgentDefinition, DeployMetadata)> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DeployError::agent_not_found(name))?;
        let entry = factory();
        validate_entry(name, &entry)?;

        let metadata = DeployMetadata {
            display_name: entry
                .display_name
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| name.to_string()),
            description: entry.description,
            requirements: self.defaults.requirements.clone(),
            staging_location: self.defaults.staging_location.clone(),
        };

        tracing::debug!(
            agent = %name,
            display_name = %metadata.display_name,
            model = %entry.definition.model_id(),
            "Resolved agent definition"
        );

        Ok((entry.definition, metadata))
    }

    /// List registered agent names, sorted
    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Reject factory output that cannot be deployed as the registered agent
fn validate_entry(name: &str, entry: &AgentEntry) -> Result<()> {
    if entry.definition.name() != name {
        return Err(DeployError::InvalidDefinition(format!(
            "Agent registered as '{}' builds a definition named '{}'",
            name,
            entry.definition.name()
        )));
    }
    if entry.definition.model_id().trim().is_empty() {
        return Err(DeployError::InvalidDefinition(format!(
            "Agent '{}' has an empty model id",
            name
        )));
    }
    Ok(())
}
