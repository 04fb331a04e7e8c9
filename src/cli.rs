// ABOUTME: Command-line definition for enginectl.
// ABOUTME: Global flags pick the config file and log format; subcommands map to operations.

use clap::{Parser, Subcommand};
use enginectl_agent::ResourceName;
use std::path::PathBuf;

/// Deploy agent definitions to a managed agent engine and check they respond.
#[derive(Debug, Parser)]
#[command(name = "enginectl", version, about)]
pub struct Cli {
    /// Path to the TOML config file (defaults to ./enginectl.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Create the named agent remotely, or update it when its display name already exists
    Deploy {
        /// Registered agent name, e.g. fp_agent
        agent: String,
    },

    /// Send a test query to a deployed agent and print the streamed events
    Verify {
        /// Full resource name: projects/<id>/locations/<region>/reasoningEngines/<id>
        #[arg(value_parser = parse_resource_name)]
        resource: String,

        /// User id sent with the query (overrides config)
        #[arg(long)]
        user_id: Option<String>,

        /// Message sent to the agent (overrides config)
        #[arg(long)]
        query: Option<String>,
    },

    /// Create an agent engine that carries only an agent identity and print
    /// the IAM bindings to grant it
    CreateIdentity,

    /// List deployed agent engines
    List,

    /// List agents known to the local registry
    Agents,
}

impl Command {
    /// Operation name used in error reports
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deploy { .. } => "deploy",
            Command::Verify { .. } => "verify",
            Command::CreateIdentity => "create-identity",
            Command::List => "list",
            Command::Agents => "agents",
        }
    }

    /// Whether the command talks to the remote directory
    pub fn is_remote(&self) -> bool {
        !matches!(self, Command::Agents)
    }
}

/// Reject malformed resource names before anything goes over the network
fn parse_resource_name(value: &str) -> Result<String, String> {
    ResourceName::parse(value)
        .map(|name| name.to_string())
        .map_err(|_| {
            format!(
                "expected projects/<project>/locations/<location>/reasoningEngines/<id>, got '{}'",
                value
            )
        })
}
