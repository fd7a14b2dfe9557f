// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP callback reporter
//!
//! Posts an [`OutcomePayload`] as JSON to the URL supplied with a trigger.
//! One attempt per outcome; failures are returned to the caller, which logs
//! them and moves on.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::domain::callback::{CallbackError, CallbackReporter, OutcomePayload};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpCallbackReporter {
    client: reqwest::Client,
}

impl HttpCallbackReporter {
    pub fn new() -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .user_agent(concat!("conduit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CallbackError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackReporter for HttpCallbackReporter {
    async fn report(&self, payload: &OutcomePayload, url: &str) -> Result<(), CallbackError> {
        debug!(callback = url, state = %payload.state, "Sending response payload");

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| CallbackError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallbackError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
