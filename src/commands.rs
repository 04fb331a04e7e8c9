// ABOUTME: Subcommand handlers: deploy, verify, create-identity, list and agents.
// ABOUTME: Each writes human-readable progress to the given writer and returns the result.

use anyhow::{Context, Result};
use enginectl_agent::{AgentIdentity, AgentRegistry, DeployError, DeploymentDirectory};
use enginectl_core::{Config, DeployAction, DeployOutcome, Reconciler, Verification, Verifier};
use futures_util::StreamExt;
use std::io::Write;
use std::time::Instant;

const RULE: &str = "============================================================";

/// Project roles an agent identity needs to call models and bill usage
pub const IDENTITY_ROLES: &[&str] = &[
    "roles/aiplatform.expressUser",
    "roles/serviceusage.serviceUsageConsumer",
];

pub async fn deploy<W: Write>(
    config: &Config,
    registry: &AgentRegistry,
    directory: &dyn DeploymentDirectory,
    agent_name: &str,
    out: &mut W,
) -> Result<DeployOutcome> {
    writeln!(out, "Deploying agent: {}", agent_name)?;
    writeln!(out, "{}", RULE)?;

    let started = Instant::now();
    let outcome = Reconciler::new(registry, directory)
        .with_policy(config.reconcile_policy())
        .deploy(agent_name)
        .await?;
    let elapsed = started.elapsed();

    let verb = match outcome.action {
        DeployAction::Created => "created",
        DeployAction::Updated => "updated in place",
    };
    writeln!(
        out,
        "[ok] {} {} ({:.1}s)",
        outcome.display_name,
        verb,
        elapsed.as_secs_f64()
    )?;
    writeln!(out, "Resource name:")?;
    writeln!(out, "  {}", outcome.resource_name)?;
    writeln!(out)?;
    writeln!(out, "Set this in applications that query the agent:")?;
    writeln!(out, "  RESOURCE_NAME=\"{}\"", outcome.resource_name)?;
    writeln!(out, "{}", RULE)?;

    Ok(outcome)
}

pub async fn verify<W: Write>(
    directory: &dyn DeploymentDirectory,
    resource_name: &str,
    user_id: &str,
    query: &str,
    out: &mut W,
) -> Result<Verification> {
    writeln!(out, "Verifying: {}", resource_name)?;
    writeln!(out, "User: {}", user_id)?;
    writeln!(out, "Query: {}", query)?;
    writeln!(out, "{}", RULE)?;

    let mut write_error = None;
    let result = Verifier::new(directory)
        .verify_with(resource_name, user_id, query, |event| {
            let text = event.text();
            let line = if text.is_empty() {
                event.to_string()
            } else {
                text
            };
            if let Err(e) = writeln!(out, "{}", line) {
                write_error.get_or_insert(e);
            }
        })
        .await;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write event");
    }

    let verification = match result {
        Ok(verification) => verification,
        Err(e @ DeployError::NotFound { .. }) => {
            writeln!(out, "The agent may not be deployed yet. Deploy it first:")?;
            writeln!(out, "  enginectl deploy <agent>")?;
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    writeln!(out, "{}", RULE)?;
    if verification.is_success() {
        writeln!(
            out,
            "[ok] agent responded with {} event(s)",
            verification.events.len()
        )?;
    } else {
        writeln!(out, "[warn] agent is deployed but returned no events")?;
    }

    Ok(verification)
}

/// Create an identity-only engine, then print shell commands that grant its
/// service account the roles in [`IDENTITY_ROLES`].
pub async fn create_identity<W: Write>(
    config: &Config,
    directory: &dyn DeploymentDirectory,
    out: &mut W,
) -> Result<AgentIdentity> {
    writeln!(
        out,
        "Creating agent engine in {}/{}...",
        config.project.project_id, config.project.location
    )?;

    let identity = directory.create_identity().await?;

    writeln!(out, "{}", RULE)?;
    writeln!(out, "[ok] agent engine created")?;
    writeln!(out, "Resource name:   {}", identity.resource_name)?;
    writeln!(out, "Service account: {}", identity.service_account)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "# Next steps: grant IAM roles to the agent identity")?;
    writeln!(out, "export SERVICE_ACCOUNT=\"{}\"", identity.service_account)?;
    writeln!(out, "export PROJECT_ID=\"{}\"", config.project.project_id)?;
    for role in IDENTITY_ROLES {
        writeln!(out)?;
        writeln!(out, "gcloud projects add-iam-policy-binding $PROJECT_ID \\")?;
        writeln!(out, "    --member=\"serviceAccount:$SERVICE_ACCOUNT\" \\")?;
        writeln!(out, "    --role=\"{}\"", role)?;
    }

    Ok(identity)
}

/// Print every deployed instance, one per line. Returns how many were listed.
pub async fn list<W: Write>(directory: &dyn DeploymentDirectory, out: &mut W) -> Result<usize> {
    let mut instances = directory.list();
    let mut count = 0;

    while let Some(instance) = instances.next().await {
        let instance = instance?;
        writeln!(out, "{}\t{}", instance.display_name, instance.resource_name)?;
        count += 1;
    }

    writeln!(out, "{} agent engine(s)", count)?;
    Ok(count)
}

/// Print the locally registered agents with the display name each deploys under.
pub fn agents<W: Write>(registry: &AgentRegistry, out: &mut W) -> Result<()> {
    for name in registry.available() {
        let (definition, metadata) = registry.resolve(name)?;
        writeln!(
            out,
            "{}\t{}\t{}",
            name,
            metadata.display_name,
            definition.model_id()
        )?;
    }
    Ok(())
}
