// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod deployment;
pub mod git_pipeline;
pub mod locks;
pub mod rollover;

pub use deployment::{DeploymentError, DeploymentService};
pub use git_pipeline::{GitPushPipeline, PipelineError, RepositoryLease};
pub use rollover::RolloverEngine;
