// ABOUTME: Create-or-update reconciliation of a local agent against remote instances.
// ABOUTME: Display name is the matching key; conflicts re-scan and retry.

use enginectl_agent::{
    AgentRegistry, DeployError, DeploymentDirectory, RemoteInstance, Result,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// What to do when the directory cannot be listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingFailurePolicy {
    /// Log a warning and treat the directory as having no match.
    /// May create a duplicate if the outage was transient.
    #[default]
    Proceed,
    /// Fail the deploy with the listing error
    Abort,
}

impl std::str::FromStr for ListingFailurePolicy {
    type Err = DeployError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proceed" => Ok(ListingFailurePolicy::Proceed),
            "abort" => Ok(ListingFailurePolicy::Abort),
            other => Err(DeployError::Config(format!(
                "unknown listing failure policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub on_listing_failure: ListingFailurePolicy,
    /// Extra attempts after the remote rejects a create as a duplicate
    pub conflict_retries: u32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            on_listing_failure: ListingFailurePolicy::Proceed,
            conflict_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Created,
    Updated,
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployAction::Created => write!(f, "created"),
            DeployAction::Updated => write!(f, "updated"),
        }
    }
}

/// Result of one deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub agent_name: String,
    pub display_name: String,
    pub resource_name: String,
    pub action: DeployAction,
}

/// Decides create vs update for an agent and performs exactly one of them.
///
/// Holds no state between runs. Two concurrent deploys of the same display
/// name can both miss in the listing; when the remote rejects duplicate
/// names, the loser sees a conflict, re-scans and takes the update path.
pub struct Reconciler<'a> {
    registry: &'a AgentRegistry,
    directory: &'a dyn DeploymentDirectory,
    policy: ReconcilePolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(registry: &'a AgentRegistry, directory: &'a dyn DeploymentDirectory) -> Self {
        Self {
            registry,
            directory,
            policy: ReconcilePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deploy the named agent, returning the resulting resource name and action
    pub async fn deploy(&self, agent_name: &str) -> Result<DeployOutcome> {
        let (definition, metadata) = self.registry.resolve(agent_name)?;
        let mut conflicts = 0u32;

        loop {
            let existing = self.find_existing(&metadata.display_name).await?;

            let result = match &existing {
                Some(instance) => {
                    tracing::info!(
                        agent = %agent_name,
                        display_name = %metadata.display_name,
                        resource_name = %instance.resource_name,
                        backend = self.directory.name(),
                        "Updating existing deployment"
                    );
                    self.directory
                        .update(&instance.resource_name, &definition, &metadata)
                        .await
                        .map(|instance| (instance, DeployAction::Updated))
                }
                None => {
                    tracing::info!(
                        agent = %agent_name,
                        display_name = %metadata.display_name,
                        staging = %metadata.staging_location,
                        backend = self.directory.name(),
                        "Creating new deployment"
                    );
                    self.directory
                        .create(&definition, &metadata)
                        .await
                        .map(|instance| (instance, DeployAction::Created))
                }
            };

            match result {
                Ok((instance, action)) => {
                    tracing::info!(
                        agent = %agent_name,
                        resource_name = %instance.resource_name,
                        action = %action,
                        "Deploy finished"
                    );
                    return Ok(DeployOutcome {
                        agent_name: agent_name.to_string(),
                        display_name: metadata.display_name.clone(),
                        resource_name: instance.resource_name,
                        action,
                    });
                }
                Err(e) if e.is_conflict() && conflicts < self.policy.conflict_retries => {
                    conflicts += 1;
                    tracing::warn!(
                        display_name = %metadata.display_name,
                        attempt = conflicts,
                        "Display name taken concurrently, re-scanning"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// First instance whose display name equals `display_name`, in listing order.
    ///
    /// Listing order is whatever the remote returns, so with duplicate display
    /// names the chosen instance is not stable across runs.
    pub async fn find_existing(&self, display_name: &str) -> Result<Option<RemoteInstance>> {
        let mut instances = self.directory.list();
        let mut scanned = 0usize;

        while let Some(item) = instances.next().await {
            match item {
                Ok(instance) if instance.display_name == display_name => {
                    tracing::info!(
                        display_name = %display_name,
                        resource_name = %instance.resource_name,
                        scanned,
                        "Found existing deployment"
                    );
                    return Ok(Some(instance));
                }
                Ok(_) => scanned += 1,
                Err(e) => match self.policy.on_listing_failure {
                    ListingFailurePolicy::Proceed => {
                        tracing::warn!(
                            error = %e,
                            display_name = %display_name,
                            "Could not list existing deployments, continuing as if none match"
                        );
                        return Ok(None);
                    }
                    ListingFailurePolicy::Abort => return Err(e),
                },
            }
        }

        tracing::debug!(display_name = %display_name, scanned, "No existing deployment");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parses_case_insensitively() {
        assert_eq!(
            "Abort".parse::<ListingFailurePolicy>().unwrap(),
            ListingFailurePolicy::Abort
        );
        assert_eq!(
            " proceed ".parse::<ListingFailurePolicy>().unwrap(),
            ListingFailurePolicy::Proceed
        );
        assert!("retry".parse::<ListingFailurePolicy>().is_err());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(DeployAction::Created.to_string(), "created");
        assert_eq!(DeployAction::Updated.to_string(), "updated");
    }
}
