use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::backend::ServiceKind;
use crate::project::Service;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "forge.yaml";

/// Project configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub backend: ServiceKind,
    pub repo: String,
    #[serde(default)]
    pub instance_url: Option<String>,
    /// Environment variable holding the access token
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl ProjectConfig {
    /// Parse and validate a configuration document
    pub fn parse(content: &str) -> Result<Self> {
        let config: ProjectConfig =
            serde_yaml::from_str(content).context("Failed to parse configuration YAML")?;

        config.owner_and_repo()?;
        if config.backend == ServiceKind::Forgejo && config.instance_url.is_none() {
            anyhow::bail!("instance_url is required for the forgejo backend");
        }

        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Split `repo` into namespace and repository name
    pub fn owner_and_repo(&self) -> Result<(&str, &str)> {
        match self.repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok((owner, name))
            }
            _ => anyhow::bail!("Invalid repo format '{}'. Expected: owner/repo", self.repo),
        }
    }

    pub fn token_env(&self) -> &str {
        self.token_env
            .as_deref()
            .unwrap_or_else(|| self.backend.token_env())
    }

    /// Token given explicitly, or else read from the configured environment variable
    pub fn resolve_token(&self, explicit: Option<String>) -> Option<String> {
        explicit.or_else(|| std::env::var(self.token_env()).ok())
    }

    /// Connect to the configured service
    pub fn service(&self, token: Option<&str>) -> Result<Service> {
        match self.backend {
            ServiceKind::Forgejo => {
                let url = self
                    .instance_url
                    .as_deref()
                    .context("instance_url is required for the forgejo backend")?;
                Service::forgejo(url, token).context("Failed to create Forgejo client")
            }
            ServiceKind::GitHub => {
                let token = token.with_context(|| {
                    format!("GitHub token is required. Set {} or use --token", self.token_env())
                })?;
                Service::github(token).context("Failed to create GitHub client")
            }
        }
    }
}
