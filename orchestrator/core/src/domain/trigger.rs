// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Trigger Validation Domain Service
//!
//! A trigger is an inbound request to deploy a repository, either from a
//! registry webhook or from a git post-receive hook. Every trigger is
//! normalised into a [`TriggerEvent`] and must pass [`TriggerValidator`]
//! before anything touches the container runtime.
//!
//! # Token semantics
//!
//! The token check is plain equality against the configured secret. An empty
//! configured secret is a valid secret: it only matches an empty request
//! token. Operators who leave the token unset therefore run without
//! authentication, and that is a configuration choice.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure decision function over configuration and event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

/// Whitelist entry matching every repository
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub Uuid);

impl TriggerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TriggerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalised inbound deployment request. Never persisted.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub id: TriggerId,
    /// Image name / repository path, e.g. `acme/app`
    pub repository_identity: String,
    /// Narrow evaluation to a single tag; `None` evaluates every allowed tag
    pub tag: Option<String>,
    pub callback_url: Option<String>,
    pub auth_token: String,
    pub received_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn new(repository_identity: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            id: TriggerId::new(),
            repository_identity: repository_identity.into(),
            tag: None,
            callback_url: None,
            auth_token: auth_token.into(),
            received_at: Utc::now(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_callback(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

/// Ordered set of repository identities, optionally containing `*`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoWhitelist {
    entries: Vec<String>,
}

impl RepoWhitelist {
    pub fn new(entries: Vec<String>) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !deduped.contains(&entry) {
                deduped.push(entry);
            }
        }
        Self { entries: deduped }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.iter().any(|e| e == WILDCARD || e == identity)
    }
}

/// Image tags eligible for rollover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAllowList {
    tags: Vec<String>,
}

impl TagAllowList {
    pub fn new(tags: Vec<String>) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !deduped.contains(&tag) {
                deduped.push(tag);
            }
        }
        Self { tags: deduped }
    }

    pub fn allows(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Narrow the allow-list to a single hinted tag. A hint outside the
    /// allow-list yields an empty filter, so nothing is eligible.
    pub fn narrowed(&self, hint: Option<&str>) -> TagAllowList {
        match hint {
            None => self.clone(),
            Some(tag) if self.allows(tag) => TagAllowList { tags: vec![tag.to_string()] },
            Some(_) => TagAllowList { tags: Vec::new() },
        }
    }
}

impl Default for TagAllowList {
    fn default() -> Self {
        Self::new(vec!["latest".to_string()])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerRejection {
    #[error("invalid token")]
    Unauthorized,
    #[error("{0} is not on whitelist")]
    NotWhitelisted(String),
    #[error("repository name is required")]
    MissingIdentity,
}

/// A trigger that passed validation
#[derive(Debug, Clone)]
pub struct AuthorizedTrigger {
    event: TriggerEvent,
}

impl AuthorizedTrigger {
    pub fn event(&self) -> &TriggerEvent {
        &self.event
    }

    pub fn identity(&self) -> &str {
        &self.event.repository_identity
    }
}

/// Authenticates a trigger and checks its identity against the whitelist
#[derive(Debug, Clone)]
pub struct TriggerValidator {
    token: String,
    whitelist: RepoWhitelist,
}

impl TriggerValidator {
    pub fn new(token: impl Into<String>, whitelist: RepoWhitelist) -> Self {
        Self {
            token: token.into(),
            whitelist,
        }
    }

    /// Token comparison only; used by routes that carry no repository identity
    pub fn authenticate(&self, token: &str) -> Result<(), TriggerRejection> {
        // Length leaks, content does not.
        if bool::from(self.token.as_bytes().ct_eq(token.as_bytes())) {
            Ok(())
        } else {
            Err(TriggerRejection::Unauthorized)
        }
    }

    pub fn validate(&self, event: TriggerEvent) -> Result<AuthorizedTrigger, TriggerRejection> {
        self.authenticate(&event.auth_token)?;

        if event.repository_identity.is_empty() {
            return Err(TriggerRejection::MissingIdentity);
        }

        if !self.whitelist.contains(&event.repository_identity) {
            return Err(TriggerRejection::NotWhitelisted(event.repository_identity));
        }

        Ok(AuthorizedTrigger { event })
    }
}
