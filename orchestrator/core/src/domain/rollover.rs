// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Rollover Domain Types
//!
//! Image reference parsing and the per-trigger report aggregated by the
//! rollover engine.

use serde::{Deserialize, Serialize};

use crate::domain::runtime::ContainerId;

/// Tag assumed when an image reference carries none
pub const DEFAULT_TAG: &str = "latest";

/// `repo[:tag]` split into its parts.
///
/// A colon only separates the tag when nothing after it contains a `/`, so
/// registry ports (`registry.local:5000/team/app`) stay part of the repo.
/// Digest references (`repo@sha256:...`) keep the whole string as repo and
/// have no tag, so they never match an allow-listed tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repo: String,
    pub tag: Option<String>,
}

impl ImageRef {
    pub fn parse(image: &str) -> Self {
        if image.contains('@') {
            return Self {
                repo: image.to_string(),
                tag: None,
            };
        }
        match image.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') && !repo.is_empty() => Self {
                repo: repo.to_string(),
                tag: Some(tag.to_string()),
            },
            _ => Self {
                repo: image.to_string(),
                tag: Some(DEFAULT_TAG.to_string()),
            },
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}", self.repo, tag),
            None => f.write_str(&self.repo),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeState {
    Success,
    Error,
}

impl std::fmt::Display for OutcomeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeState::Success => f.write_str("success"),
            OutcomeState::Error => f.write_str("error"),
        }
    }
}

/// Result of rolling over one matched container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerOutcome {
    /// Short id of the container that was replaced
    pub container: String,
    pub image: String,
    pub state: OutcomeState,
    /// Short id of the replacement, once created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContainerOutcome {
    pub fn success(old: &ContainerId, image: &ImageRef, new: &ContainerId) -> Self {
        Self {
            container: old.short().to_string(),
            image: image.to_string(),
            state: OutcomeState::Success,
            replacement: Some(new.short().to_string()),
            error: None,
        }
    }

    pub fn failure(
        old: &ContainerId,
        image: &ImageRef,
        new: Option<&ContainerId>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            container: old.short().to_string(),
            image: image.to_string(),
            state: OutcomeState::Error,
            replacement: new.map(|id| id.short().to_string()),
            error: Some(format!("{}: {}", old.short(), error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == OutcomeState::Success
    }
}

/// Aggregate over every container matched for one identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverReport {
    pub identity: String,
    pub outcomes: Vec<ContainerOutcome>,
    /// Set when the run failed before any container could be evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
}

impl RolloverReport {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            outcomes: Vec::new(),
            fatal: None,
        }
    }

    pub fn push(&mut self, outcome: ContainerOutcome) {
        self.outcomes.push(outcome);
    }

    /// `error` if the run aborted or any single rollover failed
    pub fn state(&self) -> OutcomeState {
        if self.fatal.is_some() || self.outcomes.iter().any(|o| !o.is_success()) {
            OutcomeState::Error
        } else {
            OutcomeState::Success
        }
    }

    pub fn is_success(&self) -> bool {
        self.state() == OutcomeState::Success
    }

    pub fn first_failure(&self) -> Option<&str> {
        self.fatal
            .as_deref()
            .or_else(|| self.outcomes.iter().find_map(|o| o.error.as_deref()))
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn description(&self) -> String {
        match self.first_failure() {
            Some(failure) => format!("error deploying {}: {}", self.identity, failure),
            None => format!("deployed {}", self.identity),
        }
    }
}
