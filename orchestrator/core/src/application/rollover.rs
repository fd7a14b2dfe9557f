// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Rollover Engine
//!
//! Replaces every running container of an identity with a fresh container
//! from the newly pulled image.
//!
//! # Per-container sequence
//!
//! 1. pull `identity:tag`
//! 2. inspect the running container
//! 3. clear the hostname in the copied config
//! 4. create the replacement (unnamed)
//! 5. with host port bindings: stop + remove the old container, then start
//!    the new one. Without: start the new one, then stop + remove the old.
//!
//! A failure only affects the container it happened on; the loop moves on
//! and the report turns `error`. Runs for the same identity are serialised,
//! runs for different identities proceed concurrently.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Core replace-in-place orchestration over `RuntimeClient`

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::application::locks::KeyedLocks;
use crate::domain::rollover::{ContainerOutcome, ImageRef, RolloverReport};
use crate::domain::runtime::{
    ContainerId, ContainerSummary, PullCredentials, RuntimeClient, RuntimeError,
};
use crate::domain::trigger::TagAllowList;

/// Grace period before the runtime kills a stopping container
pub const STOP_GRACE: Duration = Duration::from_secs(5);

pub struct RolloverEngine {
    runtime: Arc<dyn RuntimeClient>,
    credentials: Option<PullCredentials>,
    locks: KeyedLocks,
}

/// Error on one container, with the replacement id if it got that far
struct StepFailure {
    replacement: Option<ContainerId>,
    error: RuntimeError,
}

impl StepFailure {
    fn before_create(error: RuntimeError) -> Self {
        Self {
            replacement: None,
            error,
        }
    }

    fn after_create(replacement: &ContainerId, error: RuntimeError) -> Self {
        Self {
            replacement: Some(replacement.clone()),
            error,
        }
    }
}

impl RolloverEngine {
    pub fn new(runtime: Arc<dyn RuntimeClient>, credentials: Option<PullCredentials>) -> Self {
        Self {
            runtime,
            credentials,
            locks: KeyedLocks::new(),
        }
    }

    /// Roll over every running container of `identity` whose tag is allowed
    pub async fn rollover(&self, identity: &str, tags: &TagAllowList) -> RolloverReport {
        let _guard = self.locks.acquire(identity).await;
        info!(repo = identity, tags = ?tags.tags(), "Deploying");

        let mut report = RolloverReport::new(identity);

        let containers = match self.runtime.list_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                error!(repo = identity, error = %e, "Failed to list containers");
                report.fatal = Some(e.to_string());
                return report;
            }
        };

        debug!(repo = identity, instances = containers.len(), "Checking containers for repository");

        for container in containers {
            let Some(image) = matching_image(&container, identity, tags) else {
                continue;
            };

            info!(container = %container.id.short(), image = %image, "Deploying new image for container");
            let outcome = match self.roll_one(&container.id, &image).await {
                Ok(replacement) => {
                    info!(
                        container = %container.id.short(),
                        replacement = %replacement.short(),
                        "Deployed new container"
                    );
                    ContainerOutcome::success(&container.id, &image, &replacement)
                }
                Err(failure) => {
                    warn!(
                        container = %container.id.short(),
                        failed_on = failure.error.container().unwrap_or_default(),
                        error = %failure.error,
                        "Rollover failed for container"
                    );
                    ContainerOutcome::failure(
                        &container.id,
                        &image,
                        failure.replacement.as_ref(),
                        &failure.error,
                    )
                }
            };
            report.push(outcome);
        }

        info!(
            repo = identity,
            matched = report.outcomes.len(),
            succeeded = report.succeeded(),
            state = %report.state(),
            "Deploy finished"
        );
        report
    }

    async fn roll_one(&self, old: &ContainerId, image: &ImageRef) -> Result<ContainerId, StepFailure> {
        let tag = image.tag().unwrap_or_default();
        let cid = old.short();

        debug!(container = cid, image = %image, "Pulling new image");
        self.runtime
            .pull_image(&image.repo, tag, self.credentials.as_ref())
            .await
            .map_err(StepFailure::before_create)?;

        let record = self
            .runtime
            .inspect_container(old)
            .await
            .map_err(StepFailure::before_create)?;

        debug!(container = cid, "Creating new container");
        let replacement = self
            .runtime
            .create_container(record.replacement_spec())
            .await
            .map_err(StepFailure::before_create)?;

        if record.has_port_bindings() {
            // Host ports are exclusive: the old container has to release them first.
            debug!(container = cid, "Port bindings present, retiring old container first");
            self.retire(old)
                .await
                .map_err(|e| StepFailure::after_create(&replacement, e))?;
            self.runtime
                .start_container(&replacement)
                .await
                .map_err(|e| StepFailure::after_create(&replacement, e))?;
        } else {
            self.runtime
                .start_container(&replacement)
                .await
                .map_err(|e| StepFailure::after_create(&replacement, e))?;
            self.retire(old)
                .await
                .map_err(|e| StepFailure::after_create(&replacement, e))?;
        }

        Ok(replacement)
    }

    async fn retire(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        debug!(container = id.short(), "Stopping old container");
        self.runtime.stop_container(id, STOP_GRACE).await?;

        debug!(container = id.short(), "Removing old container");
        self.runtime.remove_container(id).await
    }
}

/// Parsed image of `container` if it runs `identity` with an allowed tag
fn matching_image(container: &ContainerSummary, identity: &str, tags: &TagAllowList) -> Option<ImageRef> {
    let image = ImageRef::parse(&container.image);
    if image.repo != identity {
        return None;
    }
    match image.tag() {
        Some(tag) if tags.allows(tag) => Some(image),
        _ => {
            debug!(
                container = container.id.short(),
                image = %container.image,
                "Skipping container, tag not allowed"
            );
            None
        }
    }
}
