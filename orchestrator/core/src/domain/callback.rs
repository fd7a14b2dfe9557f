// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::rollover::{OutcomeState, RolloverReport};

/// Context string attached to every outcome posted back to a caller
pub const CALLBACK_CONTEXT: &str = "conduit";

/// Outcome of one trigger, posted at most once to its callback URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomePayload {
    pub state: OutcomeState,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

impl OutcomePayload {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            state: OutcomeState::Success,
            description: description.into(),
            context: Some(CALLBACK_CONTEXT.to_string()),
            target_url: None,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            state: OutcomeState::Error,
            description: description.into(),
            context: Some(CALLBACK_CONTEXT.to_string()),
            target_url: None,
        }
    }

    pub fn from_report(report: &RolloverReport) -> Self {
        match report.state() {
            OutcomeState::Success => Self::success(report.description()),
            OutcomeState::Error => Self::error(report.description()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Failed to post callback to {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("Callback to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Posts outcomes back to the trigger's origin. Single attempt, no retry.
#[async_trait]
pub trait CallbackReporter: Send + Sync {
    async fn report(&self, payload: &OutcomePayload, url: &str) -> Result<(), CallbackError>;
}
