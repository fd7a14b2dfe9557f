// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

// Deployer Configuration Types
//
// Defines the process-wide configuration for a conduit instance:
// - Listen address and HTTP front door settings, including server TLS
// - Repository whitelist, tag allow-list and shared hook token
// - Container runtime endpoint and TLS material
// - Registry credentials used for image pulls
// - Git push pipeline directories and external tool locations
//
// The configuration is built once at startup and shared read-only behind an
// `Arc`. Nothing mutates it after `DeployerConfig::validate` has passed.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::runtime::PullCredentials;
use crate::domain::trigger::{RepoWhitelist, TagAllowList};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DOCKER_URL: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_REPO_ROOT_DIR: &str = "/var/lib/conduit/repos";
pub const DEFAULT_REPO_WORK_DIR: &str = "/var/lib/conduit/work";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level conduit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployerConfig {
    /// Address the HTTP front door binds to
    pub listen_addr: String,

    /// TLS for the HTTP front door; plain HTTP when unset
    pub server_tls: ServerTlsConfig,

    /// Repositories eligible for deployment; `*` matches any repository
    pub repositories: Vec<String>,

    /// Image tags eligible for rollover
    pub tags: Vec<String>,

    /// Shared secret expected in `X-Token` or `?token=`
    pub token: String,

    /// Container runtime endpoint
    pub docker: DockerConfig,

    /// Registry credentials for image pulls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_auth: Option<RegistryAuth>,

    /// Git push pipeline settings
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Runtime URL (`unix://`, `tcp://`, `http://` or `https://`)
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_cert: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_key: Option<PathBuf>,
}

/// Certificate and key the front door serves. With a CA configured, clients
/// must present a certificate signed by it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerTlsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl ServerTlsConfig {
    pub fn enabled(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}

/// Registry credentials.
///
/// Pulls are anonymous unless both `username` and `password` are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,
}

impl RegistryAuth {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Directory holding one bare repository per project (`{owner}/{name}`)
    pub repo_root_dir: PathBuf,

    /// Directory holding one checked-out work tree per project
    pub repo_work_dir: PathBuf,

    pub git_binary: String,

    pub compose_binary: String,

    /// When set, generated deploy hooks post a trigger to this URL
    /// instead of running the compose tool directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollover_url: Option<String>,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            server_tls: ServerTlsConfig::default(),
            repositories: Vec::new(),
            tags: vec!["latest".to_string()],
            token: String::new(),
            docker: DockerConfig::default(),
            registry_auth: None,
            git: GitConfig::default(),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DOCKER_URL.to_string(),
            tls_ca_cert: None,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            repo_root_dir: PathBuf::from(DEFAULT_REPO_ROOT_DIR),
            repo_work_dir: PathBuf::from(DEFAULT_REPO_WORK_DIR),
            git_binary: "git".to_string(),
            compose_binary: "docker-compose".to_string(),
            rollover_url: None,
        }
    }
}

impl DockerConfig {
    /// True when both client certificate and key are configured
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert.is_some() && self.tls_key.is_some()
    }
}

impl DeployerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Discover a configuration file using precedence order
    /// 1. CONDUIT_CONFIG_PATH environment variable
    /// 2. ./conduit.yaml (working directory)
    /// 3. ~/.conduit/config.yaml (user home)
    /// 4. /etc/conduit/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONDUIT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./conduit.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".conduit").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system = PathBuf::from("/etc/conduit/config.yaml");
        if system.exists() {
            return Some(system);
        }

        None
    }

    /// Load from an explicit path, a discovered path, or fall back to defaults.
    /// An explicit path that cannot be read is an error.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = cli_path {
            tracing::info!(path = %path.display(), "Loading configuration from explicit path");
            return Self::from_yaml_file(path);
        }

        match Self::discover_config() {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading configuration from discovered path");
                Self::from_yaml_file(path)
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn whitelist(&self) -> RepoWhitelist {
        RepoWhitelist::new(self.repositories.clone())
    }

    pub fn tag_allow_list(&self) -> TagAllowList {
        TagAllowList::new(self.tags.clone())
    }

    /// Check the configuration is usable before serving traffic
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repositories.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one repository must be whitelisted (use \"*\" to allow any)".to_string(),
            ));
        }
        if self.repositories.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::Invalid("whitelist contains an empty repository".to_string()));
        }
        if self.tags.is_empty() {
            return Err(ConfigError::Invalid("tag allow-list must not be empty".to_string()));
        }
        if self.docker.tls_cert.is_some() != self.docker.tls_key.is_some() {
            return Err(ConfigError::Invalid(
                "docker TLS requires both a certificate and a key".to_string(),
            ));
        }
        if self.docker.tls_enabled() && self.docker.tls_ca_cert.is_none() {
            return Err(ConfigError::Invalid(
                "docker TLS requires a CA certificate".to_string(),
            ));
        }
        if self.server_tls.cert.is_some() != self.server_tls.key.is_some() {
            return Err(ConfigError::Invalid(
                "server TLS requires both a certificate and a key".to_string(),
            ));
        }
        if self.server_tls.ca_cert.is_some() && !self.server_tls.enabled() {
            return Err(ConfigError::Invalid(
                "server TLS client CA requires a certificate and a key".to_string(),
            ));
        }
        if !self.git.repo_root_dir.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "repository root dir must be absolute: {}",
                self.git.repo_root_dir.display()
            )));
        }
        if !self.git.repo_work_dir.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "repository work dir must be absolute: {}",
                self.git.repo_work_dir.display()
            )));
        }
        Ok(())
    }

    /// Registry credentials, if complete enough to authenticate
    pub fn pull_credentials(&self) -> Option<PullCredentials> {
        self.registry_auth
            .as_ref()
            .filter(|a| a.is_complete())
            .map(|a| PullCredentials {
                username: a.username.clone(),
                password: a.password.clone(),
                email: Some(a.email.clone()).filter(|e| !e.is_empty()),
                server_address: a.server_address.clone(),
            })
    }
}
