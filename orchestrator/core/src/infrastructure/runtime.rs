// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::config::DockerConfig;
use crate::domain::runtime::{
    ContainerId, ContainerRecord, ContainerSpec, ContainerSummary, PullCredentials, RuntimeClient,
    RuntimeError,
};
use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptionsBuilder, InspectContainerOptions,
    ListContainersOptionsBuilder, RemoveContainerOptionsBuilder, StartContainerOptions,
    StopContainerOptionsBuilder,
};
use bollard::Docker;
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Seconds bollard waits on a single request
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// RuntimeClient backed by the Docker Engine API
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the endpoint described by `config.url`.
    ///
    /// `unix://` connects to a local socket, `https://` or any TCP URL with
    /// client certificates configured uses TLS, everything else plain HTTP.
    pub fn connect(config: &DockerConfig) -> Result<Self, RuntimeError> {
        let url = config.url.as_str();

        let result = if let Some(socket) = url.strip_prefix("unix://") {
            Docker::connect_with_unix(socket, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        } else if config.tls_enabled() || url.starts_with("https://") {
            let (key, cert, ca) = match (&config.tls_key, &config.tls_cert, &config.tls_ca_cert) {
                (Some(key), Some(cert), Some(ca)) => (key, cert, ca),
                _ => {
                    return Err(RuntimeError::Connect(format!(
                        "{} requires tls_ca_cert, tls_cert and tls_key",
                        url
                    )))
                }
            };
            Docker::connect_with_ssl(
                url,
                Path::new(key),
                Path::new(cert),
                Path::new(ca),
                REQUEST_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        } else {
            Docker::connect_with_http(url, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        };
        let docker = result.map_err(|e| RuntimeError::Connect(format!("{}: {}", url, e)))?;

        info!(url, tls = config.tls_enabled(), "Container runtime client configured");
        Ok(Self { docker })
    }

    /// Verify the runtime is reachable
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Connect(format!("Cannot reach container runtime: {}", e)))?;
        Ok(())
    }
}

fn credentials(creds: &PullCredentials) -> DockerCredentials {
    DockerCredentials {
        username: Some(creds.username.clone()),
        password: Some(creds.password.clone()),
        email: creds.email.clone(),
        serveraddress: creds.server_address.clone(),
        ..Default::default()
    }
}

/// Inspect documents travel through the orchestrator as JSON and are
/// decoded back into the create body here.
fn create_body(spec: ContainerSpec) -> Result<ContainerCreateBody, RuntimeError> {
    let mut body: ContainerCreateBody = serde_json::from_value(spec.config)
        .map_err(|e| RuntimeError::Create(format!("invalid container config: {}", e)))?;
    let host_config: Option<HostConfig> = match spec.host_config {
        Value::Null => None,
        other => Some(
            serde_json::from_value(other)
                .map_err(|e| RuntimeError::Create(format!("invalid host config: {}", e)))?,
        ),
    };
    body.host_config = host_config;
    Ok(body)
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let options = ListContainersOptionsBuilder::default().all(false).build();
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::List(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| match (c.id, c.image) {
                (Some(id), Some(image)) => Some(ContainerSummary {
                    id: ContainerId::new(id),
                    image,
                }),
                _ => None,
            })
            .collect())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerRecord, RuntimeError> {
        let inspect = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| RuntimeError::Inspect {
                id: id.short().to_string(),
                reason: e.to_string(),
            })?;

        let to_json = |value: Result<Value, serde_json::Error>| {
            value.map_err(|e| RuntimeError::Inspect {
                id: id.short().to_string(),
                reason: e.to_string(),
            })
        };

        let image = inspect
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default();
        let config = to_json(serde_json::to_value(&inspect.config))?;
        let host_config = to_json(serde_json::to_value(&inspect.host_config))?;

        Ok(ContainerRecord {
            id: id.clone(),
            image,
            config,
            host_config,
        })
    }

    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        creds: Option<&PullCredentials>,
    ) -> Result<(), RuntimeError> {
        info!(image, tag, authenticated = creds.is_some(), "Pulling image");
        let options = CreateImageOptionsBuilder::default()
            .from_image(image)
            .tag(tag)
            .build();

        let mut stream = self
            .docker
            .create_image(Some(options), None, creds.map(credentials));
        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!(image, tag, status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    return Err(RuntimeError::Pull {
                        image: format!("{}:{}", image, tag),
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<ContainerId, RuntimeError> {
        let body = create_body(spec)?;
        let response = self
            .docker
            .create_container(None::<CreateContainerOptions>, body)
            .await
            .map_err(|e| RuntimeError::Create(e.to_string()))?;

        for warning in &response.warnings {
            tracing::warn!(container = %response.id, warning = %warning, "Runtime warning on create");
        }
        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(|e| RuntimeError::Start {
                id: id.short().to_string(),
                reason: e.to_string(),
            })
    }

    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<(), RuntimeError> {
        let options = StopContainerOptionsBuilder::default()
            .t(grace.as_secs() as i32)
            .build();
        self.docker
            .stop_container(id.as_str(), Some(options))
            .await
            .map_err(|e| RuntimeError::Stop {
                id: id.short().to_string(),
                reason: e.to_string(),
            })
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptionsBuilder::default()
            .force(true)
            .v(true)
            .build();
        self.docker
            .remove_container(id.as_str(), Some(options))
            .await
            .map_err(|e| RuntimeError::Remove {
                id: id.short().to_string(),
                reason: e.to_string(),
            })
    }
}
