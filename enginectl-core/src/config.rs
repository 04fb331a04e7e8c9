// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Built once at startup and passed by reference to every component
use crate::reconciler::{ListingFailurePolicy, ReconcilePolicy};
use anyhow::{Context, Result};
use enginectl_agent::backends::vertex::VertexConfig;
use enginectl_agent::DeployDefaults;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "enginectl.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Bucket for packaged agent code, e.g. "gs://my-project-agent-staging"
    #[serde(default)]
    pub staging_location: String,
    #[serde(default = "default_requirements")]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub on_listing_failure: ListingFailurePolicy,
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_query")]
    pub query: String,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API root override, mostly for testing against a local fake
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

// Custom Debug impl to redact sensitive fields
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_requirements() -> Vec<String> {
    vec![
        "google-cloud-aiplatform[agent_engines,adk]".to_string(),
        "pydantic".to_string(),
        "cloudpickle".to_string(),
    ]
}

fn default_conflict_retries() -> u32 {
    2
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_user_id() -> String {
    "test-user-001".to_string()
}

fn default_query() -> String {
    "こんにちは、調子はどうですか？".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: default_location(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            staging_location: String::new(),
            requirements: default_requirements(),
            on_listing_failure: ListingFailurePolicy::default(),
            conflict_retries: default_conflict_retries(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            query: default_query(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// An explicit path must exist. Without one, `enginectl.toml` in the
    /// current directory is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Override with environment variables if present
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("GCP_PROJECT_ID") {
            self.project.project_id = val;
        }
        if let Ok(val) = std::env::var("GCP_AGENTS_LOCATION") {
            self.project.location = val;
        }
        if let Ok(val) = std::env::var("GCP_AGENTS_DEPLOY_BUCKET") {
            self.deploy.staging_location = val;
        }
        if let Ok(val) = std::env::var("ENGINECTL_ON_LISTING_FAILURE") {
            self.deploy.on_listing_failure = val.parse().with_context(|| {
                format!(
                    "ENGINECTL_ON_LISTING_FAILURE must be 'proceed' or 'abort', got: {}",
                    val
                )
            })?;
        }
        if let Ok(val) = std::env::var("ENGINECTL_CONFLICT_RETRIES") {
            self.deploy.conflict_retries = val.parse().with_context(|| {
                format!("ENGINECTL_CONFLICT_RETRIES must be a number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("ENGINECTL_POLL_INTERVAL_SECS") {
            self.deploy.poll_interval_secs = val.parse().with_context(|| {
                format!("ENGINECTL_POLL_INTERVAL_SECS must be a number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("ENGINECTL_ENDPOINT") {
            self.remote.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("GOOGLE_ACCESS_TOKEN") {
            self.remote.access_token = Some(val);
        }
        Ok(())
    }

    /// Check the fields every remote command needs
    pub fn validate_remote(&self) -> Result<()> {
        if self.project.project_id.trim().is_empty() {
            anyhow::bail!(
                "project.project_id is required (set in {} or GCP_PROJECT_ID env var)",
                DEFAULT_CONFIG_FILE
            );
        }
        if self.project.location.trim().is_empty() {
            anyhow::bail!(
                "project.location is required (set in {} or GCP_AGENTS_LOCATION env var)",
                DEFAULT_CONFIG_FILE
            );
        }
        Ok(())
    }

    /// Operation polling needs a non-zero interval or it spins on the endpoint
    pub fn validate_polling(&self) -> Result<()> {
        if self.deploy.poll_interval_secs == 0 {
            anyhow::bail!(
                "deploy.poll_interval_secs must be at least 1 (set in {} or ENGINECTL_POLL_INTERVAL_SECS env var)",
                DEFAULT_CONFIG_FILE
            );
        }
        Ok(())
    }

    /// Check the fields a deploy needs on top of validate_remote
    pub fn validate_deploy(&self) -> Result<()> {
        self.validate_remote()?;
        self.validate_polling()?;
        let staging = self.deploy.staging_location.trim();
        if staging.is_empty() {
            anyhow::bail!(
                "deploy.staging_location is required (set in {} or GCP_AGENTS_DEPLOY_BUCKET env var)",
                DEFAULT_CONFIG_FILE
            );
        }
        if !staging.starts_with("gs://") {
            anyhow::bail!(
                "deploy.staging_location must be a gs:// URI, got: {}",
                staging
            );
        }
        Ok(())
    }

    pub fn deploy_defaults(&self) -> DeployDefaults {
        DeployDefaults {
            requirements: self.deploy.requirements.clone(),
            staging_location: self.deploy.staging_location.clone(),
        }
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            on_listing_failure: self.deploy.on_listing_failure,
            conflict_retries: self.deploy.conflict_retries,
        }
    }

    pub fn vertex_config(&self) -> VertexConfig {
        let mut vertex = VertexConfig::new(&self.project.project_id, &self.project.location);
        vertex.endpoint = self.remote.endpoint.clone();
        vertex.access_token = self.remote.access_token.clone();
        vertex.poll_interval = Duration::from_secs(self.deploy.poll_interval_secs);
        vertex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.project.location, "us-central1");
        assert_eq!(config.deploy.requirements.len(), 3);
        assert_eq!(
            config.deploy.on_listing_failure,
            ListingFailurePolicy::Proceed
        );
        assert_eq!(config.deploy.conflict_retries, 2);
        assert_eq!(config.verify.user_id, "test-user-001");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[project]
project_id = "fifth-boulder"
location = "asia-northeast1"

[deploy]
staging_location = "gs://fifth-boulder-agent-staging"
requirements = ["pydantic"]
on_listing_failure = "abort"
conflict_retries = 0
poll_interval_secs = 1

[verify]
user_id = "qa"
query = "hello"
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.project.project_id, "fifth-boulder");
        assert_eq!(config.deploy.requirements, vec!["pydantic"]);
        assert_eq!(config.reconcile_policy().on_listing_failure, ListingFailurePolicy::Abort);
        assert_eq!(config.reconcile_policy().conflict_retries, 0);
        assert_eq!(config.vertex_config().poll_interval, Duration::from_secs(1));
        assert!(config.validate_deploy().is_ok());
    }

    #[test]
    fn test_validate_deploy_requires_gs_uri() {
        let mut config = Config::default();
        config.project.project_id = "p".to_string();
        assert!(config.validate_remote().is_ok());
        assert!(config.validate_deploy().is_err());

        config.deploy.staging_location = "/tmp/staging".to_string();
        let err = config.validate_deploy().unwrap_err();
        assert!(err.to_string().contains("gs://"));
    }

    #[test]
    fn test_validate_deploy_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.project.project_id = "p".to_string();
        config.deploy.staging_location = "gs://bucket".to_string();
        assert!(config.validate_deploy().is_ok());

        config.deploy.poll_interval_secs = 0;
        let err = config.validate_deploy().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
        assert!(config.validate_polling().is_err());
    }

    #[test]
    fn test_debug_redacts_access_token() {
        let mut config = Config::default();
        config.remote.access_token = Some("ya29.secret".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ya29.secret"));
    }
}
