// ABOUTME: Error taxonomy shared by the registry, directory backends and query streams.
// ABOUTME: Typed variants let the reconciler apply policy to listing and conflict failures.

use thiserror::Error;

/// What kind of thing a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// No factory registered under the agent name
    Agent,
    /// No remote instance with the given resource name
    RemoteInstance,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotFoundKind::Agent => write!(f, "agent"),
            NotFoundKind::RemoteInstance => write!(f, "remote instance"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: NotFoundKind, name: String },

    #[error("Remote service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{operation} rejected by remote service: {cause}")]
    Deployment { operation: String, cause: String },

    #[error("Display name already in use: {display_name}")]
    Conflict { display_name: String },

    #[error("Query stream failed: {0}")]
    Stream(String),

    #[error("Invalid agent definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DeployError {
    pub fn agent_not_found(name: &str) -> Self {
        DeployError::NotFound {
            kind: NotFoundKind::Agent,
            name: name.to_string(),
        }
    }

    pub fn instance_not_found(resource_name: &str) -> Self {
        DeployError::NotFound {
            kind: NotFoundKind::RemoteInstance,
            name: resource_name.to_string(),
        }
    }

    pub fn deployment(operation: &str, cause: impl std::fmt::Display) -> Self {
        DeployError::Deployment {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DeployError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DeployError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_kind() {
        let err = DeployError::agent_not_found("ghost");
        assert_eq!(err.to_string(), "agent not found: ghost");
        assert!(err.is_not_found());

        let err = DeployError::instance_not_found("projects/p/locations/l/reasoningEngines/1");
        assert!(err.to_string().starts_with("remote instance not found"));
    }

    #[test]
    fn test_deployment_error_carries_operation_and_cause() {
        let err = DeployError::deployment("create", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "create rejected by remote service: quota exceeded"
        );
        assert!(!err.is_conflict());
    }
}
