// ABOUTME: Deploy reconciliation and verification for managed agent engines
// ABOUTME: Agent-agnostic: works against any AgentRegistry and DeploymentDirectory

pub mod config;
pub mod reconciler;
pub mod verifier;

pub use config::Config;
pub use reconciler::{
    DeployAction, DeployOutcome, ListingFailurePolicy, ReconcilePolicy, Reconciler,
};
pub use verifier::{Verification, Verifier, VerifyOutcome};

// Re-export enginectl-agent types
pub use enginectl_agent::{AgentRegistry, DeployError, DeploymentDirectory, QueryEvent};
