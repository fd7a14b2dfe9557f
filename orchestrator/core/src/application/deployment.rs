// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::rollover::RolloverEngine;
use crate::domain::callback::{CallbackReporter, OutcomePayload};
use crate::domain::rollover::RolloverReport;
use crate::domain::trigger::{TagAllowList, TriggerEvent, TriggerRejection, TriggerValidator};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Rejected(#[from] TriggerRejection),
    #[error("{}", .0.description())]
    Failed(RolloverReport),
}

/// Handles one trigger end to end: validate, roll over, report back.
///
/// The outcome is posted to the trigger's callback URL from a detached task,
/// so the caller's own response never waits on the callback.
pub struct DeploymentService {
    validator: TriggerValidator,
    tags: TagAllowList,
    engine: Arc<RolloverEngine>,
    reporter: Arc<dyn CallbackReporter>,
}

impl DeploymentService {
    pub fn new(
        validator: TriggerValidator,
        tags: TagAllowList,
        engine: Arc<RolloverEngine>,
        reporter: Arc<dyn CallbackReporter>,
    ) -> Self {
        Self {
            validator,
            tags,
            engine,
            reporter,
        }
    }

    pub fn validator(&self) -> &TriggerValidator {
        &self.validator
    }

    pub async fn deploy(&self, event: TriggerEvent) -> Result<RolloverReport, DeploymentError> {
        let trigger_id = event.id;
        let rejected_callback = event.callback_url.clone();

        let trigger = match self.validator.validate(event) {
            Ok(trigger) => trigger,
            Err(rejection) => {
                warn!(trigger = %trigger_id, reason = %rejection, "Trigger rejected");
                self.notify(rejected_callback, OutcomePayload::error(rejection.to_string()));
                return Err(DeploymentError::Rejected(rejection));
            }
        };
        let event = trigger.event();

        let tags = self.tags.narrowed(event.tag.as_deref());
        let report = self.engine.rollover(trigger.identity(), &tags).await;
        let elapsed_ms = (Utc::now() - event.received_at).num_milliseconds();

        self.notify(event.callback_url.clone(), OutcomePayload::from_report(&report));

        if report.is_success() {
            info!(
                trigger = %trigger_id,
                repo = trigger.identity(),
                containers = report.outcomes.len(),
                elapsed_ms,
                "Deployed"
            );
            Ok(report)
        } else {
            error!(
                trigger = %trigger_id,
                error = %report.description(),
                elapsed_ms,
                "Error deploying"
            );
            Err(DeploymentError::Failed(report))
        }
    }

    /// Fire-and-forget callback; transport failures are logged only
    fn notify(&self, url: Option<String>, payload: OutcomePayload) {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return;
        };
        let reporter = self.reporter.clone();
        tokio::spawn(async move {
            if let Err(e) = reporter.report(&payload, &url).await {
                error!(callback = %url, error = %e, "Failed to send callback");
            }
        });
    }
}
