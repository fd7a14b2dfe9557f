// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Length of the abbreviated container id used in logs and reports
pub const SHORT_ID_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First ten characters, or the whole id when shorter
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_ID_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Running container as returned by a list call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Image reference as `repo[:tag]`
    pub image: String,
}

/// Full container definition as returned by inspect.
///
/// `config` and `host_config` are the runtime's own JSON documents. The
/// orchestrator only reads `PortBindings` and clears `Hostname`; everything
/// else is passed back verbatim on create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub image: String,
    pub config: Value,
    pub host_config: Value,
}

impl ContainerRecord {
    /// Whether the host config binds any container port to a host port
    pub fn has_port_bindings(&self) -> bool {
        match self.host_config.get("PortBindings") {
            Some(Value::Object(bindings)) => !bindings.is_empty(),
            _ => false,
        }
    }

    /// Spec for a replacement container. The hostname is cleared so the
    /// runtime assigns a fresh one while old and new may coexist.
    pub fn replacement_spec(&self) -> ContainerSpec {
        let mut config = self.config.clone();
        if let Value::Object(map) = &mut config {
            map.remove("Hostname");
        }
        ContainerSpec {
            config,
            host_config: self.host_config.clone(),
        }
    }
}

/// Definition handed to `create`; the runtime names the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub config: Value,
    pub host_config: Value,
}

/// Registry credentials forwarded with pulls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullCredentials {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub server_address: Option<String>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to connect to container runtime: {0}")]
    Connect(String),
    #[error("Failed to list containers: {0}")]
    List(String),
    #[error("Failed to inspect container: {reason}")]
    Inspect { id: String, reason: String },
    #[error("Failed to pull image {image}: {reason}")]
    Pull { image: String, reason: String },
    #[error("Failed to create container: {0}")]
    Create(String),
    #[error("Failed to start container: {reason}")]
    Start { id: String, reason: String },
    #[error("Failed to stop container: {reason}")]
    Stop { id: String, reason: String },
    #[error("Failed to remove container: {reason}")]
    Remove { id: String, reason: String },
}

impl RuntimeError {
    /// Short id of the container the failed call addressed. Left out of the
    /// message, which is always reported next to the container it concerns.
    pub fn container(&self) -> Option<&str> {
        match self {
            RuntimeError::Inspect { id, .. }
            | RuntimeError::Start { id, .. }
            | RuntimeError::Stop { id, .. }
            | RuntimeError::Remove { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Typed access to a single container runtime endpoint.
///
/// Every call is one round trip to the runtime. Implementations are bound
/// once at startup and shared across requests.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Running containers only
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerRecord, RuntimeError>;
    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        credentials: Option<&PullCredentials>,
    ) -> Result<(), RuntimeError>;
    async fn create_container(&self, spec: ContainerSpec) -> Result<ContainerId, RuntimeError>;
    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError>;
    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), RuntimeError>;
    /// Always forced, always removes attached anonymous volumes
    async fn remove_container(&self, id: &ContainerId) -> Result<(), RuntimeError>;
}
