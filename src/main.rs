// ABOUTME: Main entry point for enginectl
// ABOUTME: Parses arguments, loads config, builds the remote directory and runs one subcommand

use anyhow::Result;
use clap::Parser;
use enginectl::cli::{Cli, Command};
use enginectl::{commands, logging};
use enginectl_agent::backends::vertex::VertexDirectory;
use enginectl_agent::AgentRegistry;
use enginectl_core::Config;
use std::process::ExitCode;

/// Exit status for a deployed agent that answered with no events
const EXIT_SILENT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    logging::init(cli.log_json);

    let operation = cli.command.name();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, operation, "Command failed");
            eprintln!("[error] {} failed: {:#}", operation, e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;
    let registry = AgentRegistry::builtin(config.deploy_defaults());
    let mut stdout = std::io::stdout();

    if !cli.command.is_remote() {
        commands::agents(&registry, &mut stdout)?;
        return Ok(ExitCode::SUCCESS);
    }

    config.validate_remote()?;
    let directory = VertexDirectory::new(config.vertex_config())?;
    tracing::info!(
        project_id = %config.project.project_id,
        location = %config.project.location,
        "Configuration loaded"
    );

    match cli.command {
        Command::Deploy { agent } => {
            config.validate_deploy()?;
            commands::deploy(&config, &registry, &directory, &agent, &mut stdout).await?;
        }
        Command::Verify {
            resource,
            user_id,
            query,
        } => {
            let user_id = user_id.unwrap_or_else(|| config.verify.user_id.clone());
            let query = query.unwrap_or_else(|| config.verify.query.clone());
            let verification =
                commands::verify(&directory, &resource, &user_id, &query, &mut stdout).await?;
            if !verification.is_success() {
                return Ok(ExitCode::from(EXIT_SILENT));
            }
        }
        Command::CreateIdentity => {
            config.validate_polling()?;
            commands::create_identity(&config, &directory, &mut stdout).await?;
        }
        Command::List => {
            commands::list(&directory, &mut stdout).await?;
        }
        Command::Agents => commands::agents(&registry, &mut stdout)?,
    }

    Ok(ExitCode::SUCCESS)
}
